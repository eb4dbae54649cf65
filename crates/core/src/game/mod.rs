//! Typed calls into the host's gameplay objects
//!
//! Each host method we call has a `#[derive(ParamBlock)]` struct describing
//! its parameter block for the host build we target. The declared size is
//! checked against the live layout on every encode.

use std::sync::Arc;

use coopbridge_macros::ParamBlock;
use tracing::warn;

use crate::config::ReflectionConfig;
use crate::error::BridgeError;
use crate::invoke::{FunctionDescriptor, InvokeOutcome, ParamBlock, ThunkInvoker};
use crate::mirror::Season;
use crate::registry::{ObjectHandle, ObjectRegistry, RegistryError};

/// `SeasonChanger::SetCurrentSeason`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ParamBlock)]
#[param_block(function = "SetCurrentSeason", size = 1)]
pub struct SetCurrentSeasonParams {
    #[param(name = "NewSeason")]
    pub new_season: u8,
}

/// `Scheduler::AdvanceHours`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ParamBlock)]
#[param_block(function = "AdvanceHours", size = 4)]
pub struct AdvanceHoursParams {
    pub in_hours: i32,
}

/// Host calls used by the state mirror
pub struct GameCalls {
    registry: Arc<ObjectRegistry>,
    invoker: Arc<ThunkInvoker>,
    targets: ReflectionConfig,
}

impl GameCalls {
    pub fn new(registry: Arc<ObjectRegistry>, invoker: Arc<ThunkInvoker>, targets: ReflectionConfig) -> Self {
        Self {
            registry,
            invoker,
            targets,
        }
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    pub fn invoker(&self) -> &Arc<ThunkInvoker> {
        &self.invoker
    }

    /// Call `P::FUNCTION` on `target`, reading outputs back into `params`
    ///
    /// Game thread only. A block that does not match the host layout
    /// disables all further host calls.
    pub fn call<P: ParamBlock>(
        &self,
        class_name: &str,
        target: ObjectHandle,
        params: &mut P,
    ) -> Result<InvokeOutcome, BridgeError> {
        let descriptor = self.registry.lookup_function(class_name, P::FUNCTION)?;
        self.call_with(&descriptor, target, params)
    }

    fn call_with<P: ParamBlock>(
        &self,
        descriptor: &FunctionDescriptor,
        target: ObjectHandle,
        params: &mut P,
    ) -> Result<InvokeOutcome, BridgeError> {
        let mut block = params.encode(descriptor).inspect_err(|e| self.invoker.fail_layout(e))?;

        let outcome = self.invoker.invoke(target, descriptor, &mut block)?;
        if outcome == InvokeOutcome::Dispatched {
            params
                .decode_outputs(descriptor, &block)
                .inspect_err(|e| self.invoker.fail_layout(e))?;
        }
        Ok(outcome)
    }

    /// Switch the host to `season` through the first live season changer
    #[tracing::instrument(skip(self))]
    pub fn set_current_season(&self, season: Season) -> Result<ObjectHandle, BridgeError> {
        let class = &self.targets.season_changer_class;
        let changer = self
            .registry
            .instances_of(class)?
            .first()
            .copied()
            .ok_or_else(|| RegistryError::NoInstances(class.clone()))?;

        let mut params = SetCurrentSeasonParams {
            new_season: season.as_u8(),
        };
        self.call(class, changer, &mut params)?;
        Ok(changer)
    }

    /// Advance every live scheduler by `hours`
    ///
    /// Returns how many schedulers were advanced. Not atomic: schedulers are
    /// called in registry order and a failure stops the loop, leaving the
    /// ones before it advanced. Nothing is rolled back and the caller does
    /// not retry, since a failed host call disables the invoker.
    #[tracing::instrument(skip(self))]
    pub fn advance_hours(&self, hours: i32) -> Result<usize, BridgeError> {
        let class = &self.targets.scheduler_class;
        let descriptor = self
            .registry
            .lookup_function(class, AdvanceHoursParams::FUNCTION)?;
        let schedulers = self.registry.instances_of(class)?;

        for (index, &scheduler) in schedulers.iter().enumerate() {
            let mut params = AdvanceHoursParams { in_hours: hours };
            if let Err(e) = self.call_with(&descriptor, scheduler, &mut params) {
                if index > 0 {
                    warn!(
                        "AdvanceHours failed on scheduler {} of {}; schedulers 0..{} already advanced by {}",
                        index,
                        schedulers.len(),
                        index,
                        hours
                    );
                }
                return Err(e);
            }
        }
        Ok(schedulers.len())
    }
}

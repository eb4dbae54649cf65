//! C-compatible exports called by the loader and the networking layer
//!
//! Every export catches panics; nothing unwinds into the host.

use std::ffi::{c_char, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tracing::instrument;

use coopbridge_core::status::{self, HOST_UNSUPPORTED_BANNER};
use coopbridge_core::{frame, runtime, ChannelError};
use coopbridge_engine::{init_host, is_game_thread, is_host_initialized, load_host, try_host, HostGlobals};
use coopbridge_sdk::HostApi;

use super::types::CAvatarState;

// Module metadata - static strings with null terminators for C compatibility
static AUTHOR: &[u8] = b"dollan\0";
static NAME: &[u8] = b"coopbridge\0";
static DESCRIPTION: &[u8] = b"Co-op reflection bridge and state replication\0";
static LICENSE: &[u8] = b"MIT\0";
static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
static LOG_TAG: &[u8] = b"COOPBRIDGE\0";

static BANNER: LazyLock<CString> =
    LazyLock::new(|| CString::new(HOST_UNSUPPORTED_BANNER).unwrap_or_default());

/// `receive_frame` result: frame accepted
pub const COOPBRIDGE_OK: i32 = 0;
/// `receive_frame` result: no session is running
pub const COOPBRIDGE_NOT_RUNNING: i32 = -1;
/// `receive_frame` result: frame was malformed or invalid and was dropped
pub const COOPBRIDGE_REJECTED: i32 = -2;
/// `receive_frame` result: the channel is closed
pub const COOPBRIDGE_CLOSED: i32 = -3;

/// Chat callback: (UTF-8 bytes, length), not null-terminated
pub type ChatCallbackFn = unsafe extern "C" fn(text: *const u8, len: usize);

static CHAT_CALLBACK: Mutex<Option<ChatCallbackFn>> = Mutex::new(None);

/// Last frame handed out by `coopbridge_poll_outgoing`
static OUTGOING: Mutex<Vec<u8>> = Mutex::new(Vec::new());

fn guarded<R>(name: &str, fallback: R, f: impl FnOnce() -> R) -> R {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Panic in {}", name);
            fallback
        }
    }
}

/// Called when the loader injects the module
///
/// Validates the host table and records the calling thread as the game
/// thread.
///
/// # Safety
/// - `api` must be null or point to a valid `HostApi` that outlives the module
/// - `error` must be a valid pointer to a buffer of at least `maxlen` bytes, or null
#[no_mangle]
#[instrument(skip_all)]
pub unsafe extern "C" fn coopbridge_load(api: *const HostApi, error: *mut c_char, maxlen: usize) -> bool {
    guarded("coopbridge_load", false, || {
        crate::configure();
        tracing::info!("coopbridge loading...");

        if is_host_initialized() {
            tracing::info!("Host already loaded, reusing it");
            return true;
        }

        let host = match load_host(api) {
            Ok(host) => host,
            Err(e) => {
                tracing::error!("Failed to load host table: {}", e);
                write_error(error, maxlen, &format!("Host error: {}", e));
                return false;
            }
        };

        if let Err(e) = init_host(HostGlobals::new(Arc::new(host))) {
            tracing::error!("Failed to init host: {}", e);
            write_error(error, maxlen, &e.to_string());
            return false;
        }

        tracing::info!("coopbridge loaded");
        tracing::info!("Game thread ID: {:?}", std::thread::current().id());
        true
    })
}

/// Called when the loader unloads the module
///
/// # Safety
/// - `error` must be a valid pointer to a buffer of at least `maxlen` bytes, or null
#[no_mangle]
#[instrument(skip_all)]
pub unsafe extern "C" fn coopbridge_unload(error: *mut c_char, maxlen: usize) -> bool {
    tracing::info!("coopbridge unloading...");

    match catch_unwind(crate::shutdown) {
        Ok(()) => true,
        Err(_) => {
            write_error(error, maxlen, "Panic during shutdown");
            false
        }
    }
}

/// Host signalled that its reflection store is populated
///
/// Starts the session. Must be called on the game thread.
#[no_mangle]
#[instrument]
pub extern "C" fn coopbridge_on_registry_ready() -> bool {
    guarded("coopbridge_on_registry_ready", false, || {
        let Some(globals) = try_host() else {
            tracing::error!("Registry ready before load");
            return false;
        };
        if !is_game_thread() {
            tracing::error!("Registry ready signalled off the game thread");
            return false;
        }
        if !globals.mark_registry_ready() && runtime::is_initialized() {
            tracing::debug!("Registry ready repeated, session already running");
            return true;
        }

        match runtime::init(globals.host.clone(), crate::configure().clone()) {
            Ok(runtime) => {
                runtime.listeners().on_chat(forward_chat);
                true
            }
            Err(e) => {
                tracing::error!("Failed to start session: {}", e);
                false
            }
        }
    })
}

/// Host rebuilt its reflection store (level change); cached handles are dropped
#[no_mangle]
#[instrument]
pub extern "C" fn coopbridge_on_registry_changed() {
    guarded("coopbridge_on_registry_changed", (), runtime::on_registry_changed);
}

/// Called by the host once per frame on the game thread
///
/// Returns the number of queued tasks executed.
#[no_mangle]
pub extern "C" fn coopbridge_on_game_frame() -> usize {
    guarded("coopbridge_on_game_frame", 0, frame::on_game_frame)
}

/// Hand one inbound frame to the replication channel
///
/// Safe to call from any thread.
///
/// # Safety
/// - `data` must point to `len` readable bytes, or be null with `len == 0`
#[no_mangle]
pub unsafe extern "C" fn coopbridge_receive_frame(data: *const u8, len: usize) -> i32 {
    guarded("coopbridge_receive_frame", COOPBRIDGE_REJECTED, || {
        let Some(runtime) = runtime::current() else {
            return COOPBRIDGE_NOT_RUNNING;
        };
        let bytes: &[u8] = if data.is_null() || len == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(data, len)
        };

        match runtime.channel().receive_frame(bytes) {
            Ok(_) => COOPBRIDGE_OK,
            Err(ChannelError::Closed) => COOPBRIDGE_CLOSED,
            Err(_) => COOPBRIDGE_REJECTED,
        }
    })
}

/// Take the next outbound frame
///
/// Returns null when nothing is queued. The buffer stays valid until the
/// next call.
///
/// # Safety
/// - `out_len` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn coopbridge_poll_outgoing(out_len: *mut usize) -> *const u8 {
    guarded("coopbridge_poll_outgoing", std::ptr::null(), || {
        if out_len.is_null() {
            return std::ptr::null();
        }
        let next = runtime::current().and_then(|runtime| runtime.channel().poll_outgoing());

        let mut held = OUTGOING.lock();
        match next {
            Some(frame) => {
                *held = frame;
                *out_len = held.len();
                held.as_ptr()
            }
            None => {
                held.clear();
                *out_len = 0;
                std::ptr::null()
            }
        }
    })
}

/// Assign the participant id the local player owns
#[no_mangle]
pub extern "C" fn coopbridge_set_local_entity(entity_id: u64) -> bool {
    guarded("coopbridge_set_local_entity", false, || {
        runtime::current()
            .map(|runtime| runtime.mirror().set_local_entity(entity_id))
            .is_some()
    })
}

/// Apply our own avatar and queue it for the server
///
/// # Safety
/// - `state` must be null or point to a valid `CAvatarState`
#[no_mangle]
pub unsafe extern "C" fn coopbridge_send_local_update(state: *const CAvatarState) -> bool {
    guarded("coopbridge_send_local_update", false, || {
        let (Some(runtime), Some(state)) = (runtime::current(), state.as_ref()) else {
            return false;
        };
        match runtime.channel().send_local_update((*state).into()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Local update not sent: {}", e);
                false
            }
        }
    })
}

/// Queue a chat line for the server
///
/// # Safety
/// - `text` must be null or a valid null-terminated UTF-8 string
#[no_mangle]
pub unsafe extern "C" fn coopbridge_send_chat(text: *const c_char) -> bool {
    guarded("coopbridge_send_chat", false, || {
        if text.is_null() {
            return false;
        }
        let Ok(text) = CStr::from_ptr(text).to_str() else {
            tracing::warn!("Chat text is not valid UTF-8");
            return false;
        };
        let Some(runtime) = runtime::current() else {
            return false;
        };
        match runtime.channel().send_chat(text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Chat not sent: {}", e);
                false
            }
        }
    })
}

/// Register the chat sink; pass null to remove it
#[no_mangle]
pub extern "C" fn coopbridge_set_chat_callback(callback: Option<ChatCallbackFn>) {
    *CHAT_CALLBACK.lock() = callback;
}

fn forward_chat(text: &str) {
    let callback = *CHAT_CALLBACK.lock();
    if let Some(callback) = callback {
        // SAFETY: the caller registered a callback accepting (ptr, len)
        unsafe { callback(text.as_ptr(), text.len()) };
    }
}

/// `StatusFlags` bits: 0x1 host unsupported, 0x2 disconnect requested,
/// 0x4 shutdown requested
#[no_mangle]
pub extern "C" fn coopbridge_status() -> u32 {
    status::global().flags().bits()
}

/// One-time banner text, or null when the host is supported
#[no_mangle]
pub extern "C" fn coopbridge_banner() -> *const c_char {
    match status::global().banner() {
        Some(_) => BANNER.as_ptr(),
        None => std::ptr::null(),
    }
}

// Metadata exports - these return static strings for the loader to display

#[no_mangle]
pub extern "C" fn coopbridge_get_author() -> *const c_char {
    AUTHOR.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn coopbridge_get_name() -> *const c_char {
    NAME.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn coopbridge_get_description() -> *const c_char {
    DESCRIPTION.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn coopbridge_get_license() -> *const c_char {
    LICENSE.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn coopbridge_get_version() -> *const c_char {
    VERSION.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn coopbridge_get_log_tag() -> *const c_char {
    LOG_TAG.as_ptr() as *const c_char
}

/// Helper to write an error message to a C buffer
///
/// # Safety
/// - `error` must be a valid pointer or null
/// - `maxlen` must accurately reflect the buffer size
unsafe fn write_error(error: *mut c_char, maxlen: usize, msg: &str) {
    if !error.is_null() && maxlen > 0 {
        let bytes = msg.as_bytes();
        let len = bytes.len().min(maxlen - 1);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), error as *mut u8, len);
        *error.add(len) = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_is_terminated() {
        for ptr in [
            coopbridge_get_author(),
            coopbridge_get_name(),
            coopbridge_get_version(),
            coopbridge_get_log_tag(),
        ] {
            let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap();
            assert!(!text.is_empty());
        }
        let version = unsafe { CStr::from_ptr(coopbridge_get_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_write_error_truncates() {
        let mut buf = [0x7f as c_char; 6];
        unsafe { write_error(buf.as_mut_ptr(), buf.len(), "too long message") };
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
        assert_eq!(text.to_str().unwrap(), "too l");
    }

    #[test]
    fn test_exports_without_session() {
        assert_eq!(
            unsafe { coopbridge_receive_frame(std::ptr::null(), 0) },
            COOPBRIDGE_NOT_RUNNING
        );
        let mut len = 7;
        assert!(unsafe { coopbridge_poll_outgoing(&mut len) }.is_null());
        assert_eq!(len, 0);
        assert!(!coopbridge_set_local_entity(3));
        assert!(!coopbridge_on_registry_ready());
    }
}

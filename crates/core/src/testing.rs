//! In-memory reflection host for tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use coopbridge_engine::{PropertyDesc, RawObject, ReflectionHost, TypeTag};

use crate::invoke::ParamLayout;

/// Serializes tests that install the process-wide runtime or touch the
/// global status
pub static GLOBAL_RUNTIME: Mutex<()> = Mutex::new(());

type ReturnWriter = Box<dyn Fn(&mut [u8]) + Send + Sync>;

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    tag: TypeTag,
    class: Option<RawObject>,
    template: bool,
    functions: Vec<(String, RawObject)>,
    properties: Vec<PropertyDesc>,
}

/// One recorded `process_event` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub target: RawObject,
    pub function: RawObject,
    pub function_name: String,
    pub params: Vec<u8>,
}

/// Reflection store backed by a vector; slot N lives at address `(N + 1) * 0x10`
pub struct FakeHost {
    ready: AtomicBool,
    entries: Mutex<Vec<Option<Entry>>>,
    calls: Mutex<Vec<RecordedCall>>,
    return_writer: Mutex<Option<ReturnWriter>>,
    name_lookups: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            entries: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            return_writer: Mutex::new(None),
            name_lookups: AtomicUsize::new(0),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    fn addr(index: usize) -> RawObject {
        RawObject::from_addr((index + 1) * 0x10)
    }

    fn index(object: RawObject) -> Option<usize> {
        (object.addr() / 0x10).checked_sub(1)
    }

    fn push(&self, entry: Entry) -> RawObject {
        let mut entries = self.entries.lock();
        entries.push(Some(entry));
        Self::addr(entries.len() - 1)
    }

    fn with_entry<R>(&self, object: RawObject, f: impl FnOnce(&Entry) -> R) -> Option<R> {
        let entries = self.entries.lock();
        Self::index(object)
            .and_then(|i| entries.get(i))
            .and_then(Option::as_ref)
            .map(f)
    }

    pub fn add_class(&self, name: &str) -> RawObject {
        self.push(Entry {
            name: name.to_string(),
            tag: TypeTag::Class,
            class: None,
            template: false,
            functions: Vec::new(),
            properties: Vec::new(),
        })
    }

    pub fn add_function(&self, class: RawObject, name: &str, properties: Vec<PropertyDesc>) -> RawObject {
        let class_name = self.with_entry(class, |e| e.name.clone()).unwrap_or_default();
        let function = self.push(Entry {
            name: format!("{}.{}", class_name, name),
            tag: TypeTag::Function,
            class: None,
            template: false,
            functions: Vec::new(),
            properties,
        });

        self.with_entry_mut(class, |slot| {
            if let Some(entry) = slot {
                entry.functions.push((name.to_string(), function));
            }
        });
        function
    }

    pub fn add_instance(&self, class: RawObject, name: &str) -> RawObject {
        self.push(Entry {
            name: name.to_string(),
            tag: TypeTag::Object,
            class: Some(class),
            template: false,
            functions: Vec::new(),
            properties: Vec::new(),
        })
    }

    fn with_entry_mut(&self, object: RawObject, f: impl FnOnce(&mut Option<Entry>)) {
        let mut entries = self.entries.lock();
        if let Some(slot) = Self::index(object).and_then(|i| entries.get_mut(i)) {
            f(slot);
        }
    }

    pub fn add_template(&self, class: RawObject, name: &str) -> RawObject {
        let object = self.add_instance(class, name);
        self.with_entry_mut(object, |slot| {
            if let Some(entry) = slot {
                entry.template = true;
            }
        });
        object
    }

    /// Overwrite the type tag of an entry
    pub fn set_tag(&self, object: RawObject, tag: TypeTag) {
        self.with_entry_mut(object, |slot| {
            if let Some(entry) = slot {
                entry.tag = tag;
            }
        });
    }

    /// Free the slot; the address is never reused
    pub fn remove(&self, object: RawObject) {
        self.with_entry_mut(object, |slot| *slot = None);
    }

    /// Called on every `process_event` with the live frame
    pub fn set_return_writer(&self, writer: impl Fn(&mut [u8]) + Send + Sync + 'static) {
        *self.return_writer.lock() = Some(Box::new(writer));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Calls whose function is named `name`
    pub fn calls_to(&self, name: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.function_name.ends_with(&format!(".{}", name)))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Number of `full_name` queries, i.e. store walk cost
    pub fn name_lookups(&self) -> usize {
        self.name_lookups.load(Ordering::SeqCst)
    }
}

impl ReflectionHost for FakeHost {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn object_count(&self) -> usize {
        self.entries.lock().len()
    }

    fn object_at(&self, index: usize) -> Option<RawObject> {
        let entries = self.entries.lock();
        entries.get(index)?.as_ref().map(|_| Self::addr(index))
    }

    fn full_name(&self, object: RawObject) -> Option<String> {
        self.name_lookups.fetch_add(1, Ordering::SeqCst);
        self.with_entry(object, |e| e.name.clone())
    }

    fn class_of(&self, object: RawObject) -> Option<RawObject> {
        self.with_entry(object, |e| e.class).flatten()
    }

    fn type_tag(&self, object: RawObject) -> TypeTag {
        self.with_entry(object, |e| e.tag).unwrap_or(TypeTag::Unknown)
    }

    fn is_template(&self, object: RawObject) -> bool {
        self.with_entry(object, |e| e.template).unwrap_or(false)
    }

    fn find_function(&self, class: RawObject, name: &str) -> Option<RawObject> {
        self.with_entry(class, |e| {
            e.functions
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, f)| *f)
        })
        .flatten()
    }

    fn function_properties(&self, function: RawObject) -> Vec<PropertyDesc> {
        self.with_entry(function, |e| e.properties.clone())
            .unwrap_or_default()
    }

    unsafe fn process_event(&self, target: RawObject, function: RawObject, params: *mut u8) {
        let size = self
            .with_entry(function, |e| ParamLayout::from_properties(&e.properties).size())
            .unwrap_or(0);
        let frame = std::slice::from_raw_parts_mut(params, size);

        if let Some(writer) = self.return_writer.lock().as_ref() {
            writer(frame);
        }

        let function_name = self.with_entry(function, |e| e.name.clone()).unwrap_or_default();
        self.calls.lock().push(RecordedCall {
            target,
            function,
            function_name,
            params: frame.to_vec(),
        });
    }
}

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Minimal image bootstrap.
//!
//! Builds the smallest object graph the interpreter can run on: the
//! seven spaces, nil/true/false, the well-known class set with correct
//! shapes and metaclasses, empty method dictionaries, the system
//! dictionary, and the special-selector table. Production systems load a
//! full image instead; this graph backs the test suite, the image
//! round-trip property, and embedders that want to grow a world from
//! nothing.

use crate::error::VmError;
use crate::memory::{ObjectMemory, SpaceFlags, SpaceType, space_index};
use crate::object::{
    self, BehaviorFlags, HEADER_BYTES, ObjectFlags, behavior_flags_word, well_known,
};
use crate::oop::Oop;

/// Space sizes for a bootstrap world.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapConfig {
    pub eden_bytes: u64,
    pub survivor_bytes: u64,
    pub old_bytes: u64,
    pub stack_bytes: u64,
    pub remembered_set_bytes: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            eden_bytes: 512 * 1024,
            survivor_bytes: 256 * 1024,
            old_bytes: 2 * 1024 * 1024,
            stack_bytes: 256 * 1024,
            remembered_set_bytes: 64 * 1024,
        }
    }
}

/// One entry per bootstrapped class.
struct ClassSpec {
    name: &'static str,
    /// Index of the superclass in `CLASS_SPECS`, or none for Object.
    superclass: Option<usize>,
    /// Instance layout.
    layout: BehaviorFlags,
    /// Named slots of an instance.
    instance_named: u64,
    /// Well-known table slot holding the class, if any.
    well_known: Option<u64>,
    /// Named slots of the class object itself (the System class carries
    /// extra class-side state).
    class_named: u64,
}

const CLASS_NAMED: u64 = object::class::NAMED_SLOTS;
const METACLASS_NAMED: u64 = object::metaclass::NAMED_SLOTS;

const OBJECT: usize = 0;
const UNDEFINED_OBJECT: usize = 1;
const ERROR: usize = 23;
const IDENTITY_DICTIONARY: usize = 28;

#[rustfmt::skip]
fn class_specs() -> Vec<ClassSpec> {
    let plain = BehaviorFlags::empty();
    let bytes = BehaviorFlags::BYTES | BehaviorFlags::INDEXED;
    let indexed = BehaviorFlags::INDEXED;

    let spec = |name, superclass, layout, named, wk| ClassSpec {
        name,
        superclass,
        layout,
        instance_named: named,
        well_known: wk,
        class_named: CLASS_NAMED,
    };

    vec![
        spec("Object", None, plain, 0, None),
        spec("UndefinedObject", Some(OBJECT), plain, 0, None),
        spec("True", Some(OBJECT), plain, 0, None),
        spec("False", Some(OBJECT), plain, 0, None),
        spec("SmallInteger", Some(OBJECT), plain, 0, Some(well_known::SMALL_INTEGER_CLASS)),
        spec("Character", Some(OBJECT), plain, 0, Some(well_known::CHARACTER_CLASS)),
        spec("BlockClosure", Some(OBJECT), plain, 3, Some(well_known::BLOCK_CLOSURE_CLASS)),
        spec("Array", Some(OBJECT), indexed, 0, Some(well_known::ARRAY_CLASS)),
        spec("Float", Some(OBJECT), plain, 0, Some(well_known::FLOAT_CLASS)),
        spec("LargePositiveInteger", Some(OBJECT), plain, 2, Some(well_known::LARGE_POSITIVE_INTEGER_CLASS)),
        spec("LargeNegativeInteger", Some(OBJECT), plain, 2, Some(well_known::LARGE_NEGATIVE_INTEGER_CLASS)),
        spec("OSHandle", Some(OBJECT), bytes, 0, Some(well_known::OS_HANDLE_CLASS)),
        spec("ByteString", Some(OBJECT), bytes, 0, Some(well_known::BYTE_STRING_CLASS)),
        spec("ByteSymbol", Some(12), bytes, 0, Some(well_known::BYTE_SYMBOL_CLASS)),
        spec("UninterpretedBytes", Some(OBJECT), bytes, 0, Some(well_known::UNINTERPRETED_BYTES_CLASS)),
        ClassSpec {
            name: "System",
            superclass: Some(OBJECT),
            layout: plain,
            instance_named: 9,
            well_known: Some(well_known::SYSTEM_CLASS),
            class_named: object::system_class::NAMED_SLOTS,
        },
        spec("Class", Some(OBJECT), plain, CLASS_NAMED, Some(well_known::CLASS_CLASS)),
        spec("Metaclass", Some(OBJECT), plain, METACLASS_NAMED, Some(well_known::METACLASS_CLASS)),
        spec("CompiledBlock", Some(OBJECT), indexed, 10, Some(well_known::COMPILED_BLOCK_CLASS)),
        spec("Association", Some(OBJECT), plain, 2, Some(well_known::ASSOCIATION_CLASS)),
        spec("CodeContext", Some(OBJECT), indexed, 6, Some(well_known::CODE_CONTEXT_CLASS)),
        spec("ByteArray", Some(OBJECT), bytes, 0, Some(well_known::BYTE_ARRAY_CLASS)),
        spec("SmalltalkParser", Some(OBJECT), plain, 0, Some(well_known::SMALLTALK_PARSER_CLASS)),
        spec("Error", Some(OBJECT), plain, 3, Some(well_known::ERROR_CLASS)),
        spec("MessageNotUnderstood", Some(ERROR), plain, 3, Some(well_known::MESSAGE_NOT_UNDERSTOOD_CLASS)),
        spec("JsonParser", Some(OBJECT), plain, 0, Some(well_known::JSON_PARSER_CLASS)),
        spec("MemorySpace", Some(OBJECT), plain, 0, Some(well_known::MEMORY_SPACE_CLASS)),
        spec("CompiledMethod", Some(OBJECT), indexed, 10, None),
        spec("IdentityDictionary", Some(OBJECT), plain, 2, None),
    ]
}

/// The special selectors and their argument counts, in table order.
pub const SPECIAL_SELECTORS: &[(&str, i64)] = &[
    ("+", 1),
    ("-", 1),
    ("*", 1),
    ("not", 0),
    ("==", 1),
    ("~~", 1),
    ("=", 1),
    ("~=", 1),
    ("isNil", 0),
    ("notNil", 0),
    (">", 1),
    ("<", 1),
    (">=", 1),
    ("<=", 1),
    ("evaluate:", 1),
    ("printString", 0),
    ("raiseSignal", 0),
    ("perform:withArguments:", 2),
    ("halt", 0),
    ("debugIt:", 1),
    ("evaluateJsonString:", 1),
];

/// A bootstrapped world.
pub struct Bootstrap {
    /// The populated memory.
    pub mem: ObjectMemory,
}

/// Find a class by name through the system dictionary.
#[must_use]
pub fn class_named(mem: &ObjectMemory, name: &str) -> Option<Oop> {
    let dictionary = mem.known(well_known::SYSTEM_DICTIONARY);
    let values = mem.inst_var(dictionary, object::dictionary::VALUES);
    let size = mem.indexed_object_size(values);
    for i in 0..size {
        let assoc = mem.inst_var(values, i);
        if assoc == mem.nil() {
            continue;
        }
        let key = mem.inst_var(assoc, object::association::KEY);
        if mem.string_of(key) == name {
            return Some(mem.inst_var(assoc, object::association::VALUE));
        }
    }
    None
}

/// The interned special-selector symbol for a table slot.
#[must_use]
pub fn special_selector(mem: &ObjectMemory, number: u8) -> Oop {
    let system_class = mem.known(well_known::SYSTEM_CLASS);
    let table = mem.inst_var(system_class, object::system_class::SPECIAL_SELECTORS);
    mem.inst_var(table, u64::from(number) * 2)
}

impl Bootstrap {
    /// Build a minimal world with the default space sizes.
    pub fn minimal() -> Result<Self, VmError> {
        Self::with_config(BootstrapConfig::default())
    }

    /// Build a minimal world with explicit space sizes.
    pub fn with_config(config: BootstrapConfig) -> Result<Self, VmError> {
        let arena = (config.eden_bytes
            + config.survivor_bytes * 2
            + config.old_bytes
            + config.stack_bytes
            + config.remembered_set_bytes)
            * 2
            + 1024 * 1024;
        let mut mem = ObjectMemory::new(arena);

        create_spaces(&mut mem, config)?;
        create_core_graph(&mut mem)?;

        mem.audit_image()?;
        Ok(Self { mem })
    }

    /// Find a bootstrapped class by name through the system dictionary.
    #[must_use]
    pub fn class_named(&self, name: &str) -> Option<Oop> {
        class_named(&self.mem, name)
    }

    /// The interned special-selector symbol for a table slot.
    #[must_use]
    pub fn special_selector(&self, number: u8) -> Oop {
        special_selector(&self.mem, number)
    }
}

fn create_spaces(mem: &mut ObjectMemory, config: BootstrapConfig) -> Result<(), VmError> {
    let object_space = SpaceFlags::IS_OBJECT_SPACE;
    let scavenged = object_space | SpaceFlags::IS_SCAVENGED;

    mem.allocate_space(config.eden_bytes, SpaceType::Eden, scavenged)?;
    mem.allocate_space(
        config.survivor_bytes,
        SpaceType::Survivor1,
        scavenged | SpaceFlags::IS_CURRENT,
    )?;
    mem.allocate_space(config.survivor_bytes, SpaceType::Survivor2, scavenged)?;
    let remembered = mem.allocate_space(
        config.remembered_set_bytes,
        SpaceType::RememberedSet,
        SpaceFlags::IS_POINTER_SPACE,
    )?;
    // The remembered set hashes into the whole table; every slot counts
    // as live for enumeration and serialization.
    mem.spaces[remembered].first_free_block = mem.spaces[remembered].size_words();
    mem.allocate_space(
        (well_known::LAST + 31) * 8,
        SpaceType::WellKnownObjects,
        SpaceFlags::IS_POINTER_SPACE,
    )?;
    // Reserved slot kept for image-format compatibility.
    mem.allocate_space(64, SpaceType::WellKnownObjects, SpaceFlags::IS_POINTER_SPACE)?;
    mem.allocate_space(
        config.stack_bytes,
        SpaceType::Stack,
        SpaceFlags::HAS_TOP_HEADERS | SpaceFlags::IS_STACK_MANAGED,
    )?;
    mem.allocate_space(
        config.old_bytes,
        SpaceType::Old,
        object_space | SpaceFlags::IS_MARK_SWEEP_MANAGED,
    )?;

    mem.active_survivor = space_index::SURVIVOR1;
    mem.inactive_survivor = space_index::SURVIVOR2;
    mem.current_stack_space = space_index::STACK;
    mem.spaces[space_index::EDEN].remembered_set_space_number =
        space_index::REMEMBERED_SET as u16;
    Ok(())
}

/// Allocate a bare pointer object in old space: header, zeroed slots, a
/// fresh hash, no class yet. Bootstrapping patches classes afterwards.
fn raw_object(mem: &mut ObjectMemory, named: u64, indexed: u64) -> Result<Oop, VmError> {
    let size = HEADER_BYTES + (named + indexed) * 8;
    let object = mem.allocate_object_in(size, space_index::OLD)?;
    mem.set_flags(object, ObjectFlags::empty());
    mem.set_flips(object, 0);
    mem.set_named_inst_vars(object, named as u32);
    let hash = mem.next_identity_hash();
    mem.set_identity_hash(object, hash);
    for i in 0..(named + indexed) {
        mem.basic_inst_var_put(object, i, Oop::NULL);
    }
    Ok(object)
}

/// Intern a new symbol (bootstrap does not share symbol bodies; callers
/// keep the returned oop and reuse it for identity).
pub fn new_symbol(mem: &mut ObjectMemory, name: &str) -> Result<Oop, VmError> {
    let class = mem.known(well_known::BYTE_SYMBOL_CLASS);
    let symbol = mem.new_instance_of(class, name.len() as u64, space_index::OLD)?;
    for (i, byte) in name.bytes().enumerate() {
        mem.set_body_byte(symbol, i as u64, byte);
    }
    Ok(symbol)
}

/// Create a byte string in Eden.
pub fn new_string(mem: &mut ObjectMemory, contents: &str) -> Result<Oop, VmError> {
    let class = mem.known(well_known::BYTE_STRING_CLASS);
    let string = mem.new_instance_of(class, contents.len() as u64, space_index::EDEN)?;
    for (i, byte) in contents.bytes().enumerate() {
        mem.set_body_byte(string, i as u64, byte);
    }
    Ok(string)
}

/// Store `key -> value` in an identity dictionary, creating the
/// association. The values array must have a free slot.
pub fn identity_dictionary_at_put(
    mem: &mut ObjectMemory,
    dictionary: Oop,
    key: Oop,
    value: Oop,
) -> Result<(), VmError> {
    let assoc_class = mem.known(well_known::ASSOCIATION_CLASS);
    let assoc = mem.new_instance_of(assoc_class, 0, space_index::OLD)?;
    mem.inst_var_put(assoc, object::association::KEY, key);
    mem.inst_var_put(assoc, object::association::VALUE, value);

    let values = mem.inst_var(dictionary, object::dictionary::VALUES);
    let size = mem.indexed_object_size(values);
    let mut index = mem.identity_hash(key) % size;
    loop {
        let entry = mem.inst_var(values, index);
        if entry == mem.nil()
            || mem.inst_var(entry, object::association::KEY) == key
        {
            mem.inst_var_put(values, index, assoc);
            let tally = mem.inst_var(dictionary, object::dictionary::TALLY).as_small_int();
            mem.inst_var_put(
                dictionary,
                object::dictionary::TALLY,
                Oop::small_int(tally + 1),
            );
            return Ok(());
        }
        index = (index + 1) % size;
    }
}

/// Create an empty identity dictionary with `capacity` entry slots.
pub fn new_identity_dictionary(
    mem: &mut ObjectMemory,
    dictionary_class: Oop,
    capacity: u64,
) -> Result<Oop, VmError> {
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let dictionary = mem.new_instance_of(dictionary_class, 0, space_index::OLD)?;
    let values = mem.new_instance_of(array_class, capacity, space_index::OLD)?;
    mem.inst_var_put(dictionary, object::dictionary::VALUES, values);
    mem.inst_var_put(dictionary, object::dictionary::TALLY, Oop::small_int(0));
    Ok(dictionary)
}

/// Install a compiled method under a selector in a class's method
/// dictionary.
pub fn install_method(
    mem: &mut ObjectMemory,
    class: Oop,
    selector: Oop,
    method: Oop,
) -> Result<(), VmError> {
    let dictionary = mem.inst_var(class, object::behavior::METHOD_DICTIONARY);
    identity_dictionary_at_put(mem, dictionary, selector, method)
}

#[allow(clippy::too_many_lines)]
fn create_core_graph(mem: &mut ObjectMemory) -> Result<(), VmError> {
    let specs = class_specs();

    // Shells for every class and metaclass; fields are patched below.
    let mut classes = Vec::with_capacity(specs.len());
    let mut metaclasses = Vec::with_capacity(specs.len());
    for spec in &specs {
        classes.push(raw_object(mem, spec.class_named, 0)?);
        metaclasses.push(raw_object(mem, METACLASS_NAMED, 0)?);
    }

    // nil first: every later slot initialization needs it.
    let nil = raw_object(mem, 0, 0)?;
    mem.set_class_field(nil, classes[UNDEFINED_OBJECT]);
    mem.set_known(well_known::NIL, nil);

    for i in 0..specs.len() {
        let class_slots = mem.total_object_size(classes[i]);
        for slot in 0..class_slots {
            mem.basic_inst_var_put(classes[i], slot, nil);
        }
        let meta_slots = mem.total_object_size(metaclasses[i]);
        for slot in 0..meta_slots {
            mem.basic_inst_var_put(metaclasses[i], slot, nil);
        }
    }

    let true_oop = raw_object(mem, 0, 0)?;
    mem.set_class_field(true_oop, classes[2]);
    mem.set_known(well_known::TRUE, true_oop);

    let false_oop = raw_object(mem, 0, 0)?;
    mem.set_class_field(false_oop, classes[3]);
    mem.set_known(well_known::FALSE, false_oop);

    // Class pointers, superclasses and shape words.
    for (i, spec) in specs.iter().enumerate() {
        let class = classes[i];
        let meta = metaclasses[i];

        mem.set_class_field(class, meta);
        mem.set_class_field(meta, classes[17]); // Metaclass

        let superclass = match spec.superclass {
            Some(s) => classes[s],
            None => nil,
        };
        mem.basic_inst_var_put(class, object::behavior::SUPERCLASS, superclass);

        // A metaclass inherits from the superclass's metaclass; the root
        // metaclass inherits from Class.
        let meta_super = match spec.superclass {
            Some(s) => metaclasses[s],
            None => classes[16], // Class
        };
        mem.basic_inst_var_put(meta, object::behavior::SUPERCLASS, meta_super);

        mem.basic_inst_var_put(
            class,
            object::behavior::FLAGS,
            Oop::small_int(behavior_flags_word(spec.layout, spec.instance_named)),
        );
        mem.basic_inst_var_put(
            meta,
            object::behavior::FLAGS,
            Oop::small_int(behavior_flags_word(BehaviorFlags::empty(), spec.class_named)),
        );
        mem.basic_inst_var_put(meta, object::metaclass::THIS_CLASS, class);
    }

    // Well-known class slots.
    for (i, spec) in specs.iter().enumerate() {
        if let Some(slot) = spec.well_known {
            mem.set_known(slot, classes[i]);
        }
    }
    mem.set_known(well_known::OBSOLETE_CLASS, nil);
    mem.set_known(well_known::START_OBJECT, nil);
    mem.set_known(well_known::START_SELECTOR, nil);
    mem.set_known(well_known::START_CONTEXT, nil);
    mem.set_known(well_known::BYTECODE_TABLE, nil);

    // Names and method dictionaries need working allocation, which the
    // patched shape words now provide.
    for (i, spec) in specs.iter().enumerate() {
        let name = new_symbol(mem, spec.name)?;
        mem.inst_var_put(classes[i], object::class::NAME, name);

        let dict = new_identity_dictionary(mem, classes[IDENTITY_DICTIONARY], 16)?;
        mem.inst_var_put(classes[i], object::behavior::METHOD_DICTIONARY, dict);
        let meta_dict = new_identity_dictionary(mem, classes[IDENTITY_DICTIONARY], 16)?;
        mem.inst_var_put(metaclasses[i], object::behavior::METHOD_DICTIONARY, meta_dict);
    }

    // System dictionary, symbol table, exception handlers.
    let system_dictionary =
        new_identity_dictionary(mem, classes[IDENTITY_DICTIONARY], 128)?;
    mem.set_known(well_known::SYSTEM_DICTIONARY, system_dictionary);
    for class in &classes {
        let name = mem.inst_var(*class, object::class::NAME);
        identity_dictionary_at_put(mem, system_dictionary, name, *class)?;
    }

    let array_class = mem.known(well_known::ARRAY_CLASS);
    let symbol_table = mem.new_instance_of(array_class, 64, space_index::OLD)?;
    mem.set_known(well_known::SYMBOL_TABLE, symbol_table);
    let handlers = mem.new_instance_of(array_class, 8, space_index::OLD)?;
    mem.set_known(well_known::EXCEPTION_HANDLERS, handlers);

    // The special-selector table hangs off the System class.
    let system_class = mem.known(well_known::SYSTEM_CLASS);
    let table = mem.new_instance_of(
        array_class,
        SPECIAL_SELECTORS.len() as u64 * 2,
        space_index::OLD,
    )?;
    for (n, (name, argc)) in SPECIAL_SELECTORS.iter().enumerate() {
        let symbol = new_symbol(mem, name)?;
        mem.inst_var_put(table, n as u64 * 2, symbol);
        mem.inst_var_put(table, n as u64 * 2 + 1, Oop::small_int(*argc));
    }
    mem.inst_var_put(system_class, object::system_class::SPECIAL_SELECTORS, table);

    mem.current_context = nil;
    Ok(())
}

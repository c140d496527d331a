// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The image codec.
//!
//! An image is the whole object memory serialized to a byte stream:
//! a small header, then every space in a fixed order, then a zero-size
//! terminator record. Pointer oops are rewritten to a position-
//! independent offset form on the way out and back to absolute arena
//! addresses on the way in:
//!
//! ```text
//! ((space_number + 1) << 48) | (byte_offset_in_space << 3) | tag
//! ```
//!
//! Immediate values travel verbatim, byte bodies travel verbatim, and
//! the back-pointer words after bodies are recomputed on load.


pub mod bootstrap;

use crate::error::VmError;
use crate::memory::{ObjectMemory, Space, SpaceFlags, SpaceType, space_index};
use crate::object::{self, ObjectFlags, well_known};
use crate::oop::Oop;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{info, warn};
use std::io::{Read, Write};

/// Image magic, `"STIM"` little-endian.
pub const IMAGE_MAGIC: u32 = 0x4d49_5453;
/// Image format version.
pub const IMAGE_VERSION: u16 = 0x0100;

/// Serialized space record size in bytes (three u64 cursors, four u16s).
const SPACE_RECORD_BYTES: u64 = 32;

fn io_err(err: &std::io::Error) -> VmError {
    VmError::ImageIo(err.to_string())
}

// ----------------------------------------------------------------------
// Offset form

impl ObjectMemory {
    /// Space number containing a byte address, if any.
    fn space_number_of(&self, addr: u64) -> Option<usize> {
        self.spaces.iter().position(|s| {
            addr >= s.base * 8 && addr <= (s.base + s.size_words()) * 8
        })
    }

    /// Absolute pointer to offset form. Immediates and null verbatim.
    pub(crate) fn oop_to_offset(&self, value: Oop) -> u64 {
        if value.is_immediate() || value.is_null() {
            return value.bits();
        }
        match self.space_number_of(value.bits()) {
            None => {
                warn!("oop_to_offset: bad space for pointer {:#x}", value.bits());
                0
            }
            Some(space) => {
                let offset = value.bits() - self.spaces[space].base * 8;
                ((space as u64 + 1) << 48) | (offset << 3)
            }
        }
    }

    /// Offset form back to an absolute pointer.
    pub(crate) fn offset_to_oop(&self, bits: u64) -> u64 {
        if bits == 0 || bits & 7 != 0 {
            return bits;
        }
        let space = (((bits >> 48) - 1) & 0xFF) as usize;
        let offset = (bits & 0x0000_FFFF_FFFF_FFF8) >> 3;
        self.spaces[space].base * 8 + offset
    }
}

// ----------------------------------------------------------------------
// Load

struct SpaceRecord {
    space_size: u64,
    last_free_block: u64,
    first_free_block: u64,
    space_type: u16,
    space_number: u16,
    space_flags: u16,
    remembered_set_space_number: u16,
    header_words: Vec<u64>,
    body_words: Vec<u64>,
}

fn read_space_record<R: Read>(reader: &mut R) -> Result<SpaceRecord, VmError> {
    let space_size = reader.read_u64::<LittleEndian>().map_err(|e| io_err(&e))?;
    let last_free_block = reader.read_u64::<LittleEndian>().map_err(|e| io_err(&e))?;
    let first_free_block = reader.read_u64::<LittleEndian>().map_err(|e| io_err(&e))?;
    let space_type = reader.read_u16::<LittleEndian>().map_err(|e| io_err(&e))?;
    let space_number = reader.read_u16::<LittleEndian>().map_err(|e| io_err(&e))?;
    let space_flags = reader.read_u16::<LittleEndian>().map_err(|e| io_err(&e))?;
    let remembered = reader.read_u16::<LittleEndian>().map_err(|e| io_err(&e))?;

    let mut record = SpaceRecord {
        space_size,
        last_free_block,
        first_free_block,
        space_type,
        space_number,
        space_flags,
        remembered_set_space_number: remembered,
        header_words: Vec::new(),
        body_words: Vec::new(),
    };

    if space_size == 0 {
        return Ok(record);
    }

    for _ in 0..first_free_block {
        record
            .header_words
            .push(reader.read_u64::<LittleEndian>().map_err(|e| io_err(&e))?);
    }

    let flags = SpaceFlags::from_bits_truncate(space_flags);
    if !flags.contains(SpaceFlags::IS_POINTER_SPACE) {
        let body_start = last_free_block + 1;
        let total_words = space_size / 8;
        for _ in body_start..total_words {
            record
                .body_words
                .push(reader.read_u64::<LittleEndian>().map_err(|e| io_err(&e))?);
        }
    }

    Ok(record)
}

/// Load an image from a byte stream into a fresh object memory.
///
/// `arena_bytes` bounds the arena; it is raised to fit the image when
/// too small. `image_name` seeds the System class image/sources/changes
/// file names (the extension is replaced by `.sou` and `.cha`).
pub fn load_image<R: Read>(
    reader: &mut R,
    arena_bytes: u64,
    image_name: &str,
) -> Result<ObjectMemory, VmError> {
    let magic = reader.read_u32::<LittleEndian>().map_err(|e| io_err(&e))?;
    if magic != IMAGE_MAGIC {
        return Err(VmError::BadImage(format!("bad magic number: {magic:#x}")));
    }
    let version = reader.read_u16::<LittleEndian>().map_err(|e| io_err(&e))?;
    if version != IMAGE_VERSION {
        return Err(VmError::BadImage(format!("bad version: {version:#x}")));
    }
    let development = reader.read_u16::<LittleEndian>().map_err(|e| io_err(&e))?;
    let _length = reader.read_u64::<LittleEndian>().map_err(|e| io_err(&e))?;

    let mut records = Vec::new();
    loop {
        let record = read_space_record(reader)?;
        if record.space_size == 0 {
            break;
        }
        records.push(record);
    }
    if records.len() < space_index::FIRST_EXTRA {
        return Err(VmError::BadImage(format!(
            "image has only {} spaces",
            records.len()
        )));
    }

    let needed: u64 = records.iter().map(|r| r.space_size).sum::<u64>() + 4096;
    let mut mem = ObjectMemory::new(arena_bytes.max(needed * 2));
    mem.development = development != 0;

    for record in &records {
        let space_type = SpaceType::try_from(record.space_type)
            .map_err(|_| VmError::BadImage(format!("bad space type {}", record.space_type)))?;
        let flags = SpaceFlags::from_bits_truncate(record.space_flags);
        let number = mem.allocate_space(record.space_size, space_type, flags)?;

        let space = &mut mem.spaces[number];
        space.last_free_block = record.last_free_block;
        space.first_free_block = record.first_free_block;
        space.remembered_set_space_number = record.remembered_set_space_number;

        for (i, word) in record.header_words.iter().enumerate() {
            let addr = mem.space_word_addr(number, i as u64);
            mem.set_word(addr, *word);
        }
        let body_start = record.last_free_block + 1;
        for (i, word) in record.body_words.iter().enumerate() {
            let addr = mem.space_word_addr(number, body_start + i as u64);
            mem.set_word(addr, *word);
        }
    }

    if mem.spaces[space_index::SURVIVOR1].is_current() {
        mem.active_survivor = space_index::SURVIVOR1;
        mem.inactive_survivor = space_index::SURVIVOR2;
    } else {
        mem.active_survivor = space_index::SURVIVOR2;
        mem.inactive_survivor = space_index::SURVIVOR1;
    }
    mem.current_stack_space = space_index::STACK;

    relocate_loaded_spaces(&mut mem);

    mem.current_context = mem.nil();

    let system_class = mem.known(well_known::SYSTEM_CLASS);
    mem.register_remembered(system_class);

    let sources_name = replace_extension(image_name, "sou");
    let changes_name = replace_extension(image_name, "cha");

    let image_name_oop = new_byte_string(&mut mem, image_name)?;
    mem.inst_var_put(system_class, object::system_class::IMAGE_NAME, image_name_oop);

    let array_class = mem.known(well_known::ARRAY_CLASS);
    let names = mem.new_instance_of(array_class, 16, space_index::EDEN)?;
    mem.inst_var_put(system_class, object::system_class::SOURCE_FILE_NAMES, names);
    let sources_oop = new_byte_string(&mut mem, &sources_name)?;
    mem.inst_var_put(names, 0, sources_oop);
    let changes_oop = new_byte_string(&mut mem, &changes_name)?;
    mem.inst_var_put(names, 1, changes_oop);

    mem.audit_image()?;
    info!("image loaded: {image_name}");
    Ok(mem)
}

fn relocate_loaded_spaces(mem: &mut ObjectMemory) {
    for number in 0..mem.spaces.len() {
        let space = &mem.spaces[number];
        if space.is_pointer_space() {
            for slot in mem.pointer_slots(number) {
                let bits = mem.word(slot);
                let absolute = mem.offset_to_oop(bits);
                mem.set_word(slot, absolute);
            }
        } else if !space.is_stack_space() {
            for header in mem.object_headers(number) {
                relocate_loaded_object(mem, header);
            }
        }
        mem.spaces[number].space_number = number as u16;
    }
}

fn relocate_loaded_object(mem: &mut ObjectMemory, object: Oop) {
    if mem.flags(object).contains(ObjectFlags::FREE) {
        return;
    }

    let class = mem.offset_to_oop(mem.class_field(object).bits());
    mem.set_class_field(object, Oop::from_bits(class));
    let body = mem.offset_to_oop(mem.body_pointer(object));
    mem.set_body_pointer(object, body);
    mem.set_body_header_pointer(object);

    if mem.is_bytes(object) {
        return;
    }
    for i in 0..mem.total_object_size(object) {
        let value = mem.offset_to_oop(mem.inst_var(object, i).bits());
        mem.basic_inst_var_put(object, i, Oop::from_bits(value));
    }
}

fn replace_extension(name: &str, ext: &str) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{}.{ext}", &name[..dot]),
        None => format!("{name}.{ext}"),
    }
}

fn new_byte_string(mem: &mut ObjectMemory, s: &str) -> Result<Oop, VmError> {
    let class = mem.known(well_known::BYTE_STRING_CLASS);
    let object = mem.new_instance_of(class, s.len() as u64, space_index::EDEN)?;
    for (i, byte) in s.bytes().enumerate() {
        mem.set_body_byte(object, i as u64, byte);
    }
    Ok(object)
}

// ----------------------------------------------------------------------
// Save

fn image_size(mem: &ObjectMemory) -> u64 {
    let mut size = 16u64; // image header
    for space in &mem.spaces {
        size += space.first_free_block * 8 + SPACE_RECORD_BYTES;
    }
    size + SPACE_RECORD_BYTES
}

fn write_space_record<W: Write>(space: &Space, writer: &mut W) -> Result<(), VmError> {
    writer
        .write_u64::<LittleEndian>(space.space_size)
        .map_err(|e| io_err(&e))?;
    writer
        .write_u64::<LittleEndian>(space.last_free_block)
        .map_err(|e| io_err(&e))?;
    writer
        .write_u64::<LittleEndian>(space.first_free_block)
        .map_err(|e| io_err(&e))?;
    writer
        .write_u16::<LittleEndian>(space.space_type as u16)
        .map_err(|e| io_err(&e))?;
    writer
        .write_u16::<LittleEndian>(space.space_number)
        .map_err(|e| io_err(&e))?;
    writer
        .write_u16::<LittleEndian>(space.space_flags.bits())
        .map_err(|e| io_err(&e))?;
    writer
        .write_u16::<LittleEndian>(space.remembered_set_space_number)
        .map_err(|e| io_err(&e))?;
    Ok(())
}

fn object_space_to_offsets(mem: &mut ObjectMemory, space: usize) {
    for object in mem.object_headers(space) {
        if mem.is_bytes(object) || mem.flags(object).contains(ObjectFlags::FREE) {
            continue;
        }
        for i in 0..mem.total_object_size(object) {
            let offset = mem.oop_to_offset(mem.inst_var(object, i));
            mem.basic_inst_var_put(object, i, Oop::from_bits(offset));
        }
    }
}

fn object_space_from_offsets(mem: &mut ObjectMemory, space: usize) {
    for object in mem.object_headers(space) {
        if mem.is_bytes(object) || mem.flags(object).contains(ObjectFlags::FREE) {
            continue;
        }
        for i in 0..mem.total_object_size(object) {
            let absolute = mem.offset_to_oop(mem.inst_var(object, i).bits());
            mem.basic_inst_var_put(object, i, Oop::from_bits(absolute));
        }
    }
}

fn write_object_space<W: Write>(
    mem: &mut ObjectMemory,
    space: usize,
    writer: &mut W,
) -> Result<(), VmError> {
    object_space_to_offsets(mem, space);

    for object in mem.object_headers(space) {
        writer
            .write_u64::<LittleEndian>(mem.mem_size(object))
            .map_err(|e| io_err(&e))?;
        writer
            .write_u64::<LittleEndian>(mem.word(object.bits() + object::header::PACKED * 8))
            .map_err(|e| io_err(&e))?;
        writer
            .write_u64::<LittleEndian>(mem.oop_to_offset(mem.class_field(object)))
            .map_err(|e| io_err(&e))?;
        writer
            .write_u64::<LittleEndian>(mem.identity_hash(object))
            .map_err(|e| io_err(&e))?;
        writer
            .write_u64::<LittleEndian>(mem.oop_to_offset(Oop::pointer(mem.body_pointer(object))))
            .map_err(|e| io_err(&e))?;
    }

    let s = &mem.spaces[space];
    let body_start = s.last_free_block + 1;
    let total_words = s.size_words();
    for i in body_start..total_words {
        let word = mem.word(mem.space_word_addr(space, i));
        writer.write_u64::<LittleEndian>(word).map_err(|e| io_err(&e))?;
    }

    object_space_from_offsets(mem, space);
    Ok(())
}

fn write_pointer_space<W: Write>(
    mem: &ObjectMemory,
    space: usize,
    writer: &mut W,
) -> Result<(), VmError> {
    for slot in mem.pointer_slots(space) {
        let value = mem.oop_at(slot);
        let word = if value.is_null() || value.is_immediate() {
            value.bits()
        } else {
            mem.oop_to_offset(value)
        };
        writer.write_u64::<LittleEndian>(word).map_err(|e| io_err(&e))?;
    }
    Ok(())
}

/// Serialize the whole memory to a byte stream.
///
/// The start-context slot is cleared and the stack space is written
/// empty, so the resumed image starts fresh from the start-selector
/// send.
pub fn save_image<W: Write>(mem: &mut ObjectMemory, writer: &mut W) -> Result<(), VmError> {
    writer
        .write_u32::<LittleEndian>(IMAGE_MAGIC)
        .map_err(|e| io_err(&e))?;
    writer
        .write_u16::<LittleEndian>(IMAGE_VERSION)
        .map_err(|e| io_err(&e))?;
    writer
        .write_u16::<LittleEndian>(u16::from(mem.development))
        .map_err(|e| io_err(&e))?;
    writer
        .write_u64::<LittleEndian>(image_size(mem))
        .map_err(|e| io_err(&e))?;

    let saved_first_free = mem.spaces[space_index::STACK].first_free_block;
    let saved_last_free = mem.spaces[space_index::STACK].last_free_block;
    {
        let stack = &mut mem.spaces[space_index::STACK];
        stack.first_free_block = 0;
        stack.last_free_block = stack.size_words() - 1;
    }
    mem.set_known(well_known::START_CONTEXT, Oop::NULL);

    for number in 0..mem.spaces.len() {
        write_space_record(&mem.spaces[number], writer)?;
        if mem.spaces[number].is_object_space() {
            write_object_space(mem, number, writer)?;
        } else {
            write_pointer_space(mem, number, writer)?;
        }
    }

    // Zero-size terminator record.
    let terminator = Space {
        base: 0,
        space_size: 0,
        last_free_block: 0,
        first_free_block: 0,
        space_type: SpaceType::Old,
        space_number: 0,
        space_flags: SpaceFlags::empty(),
        remembered_set_space_number: 0,
    };
    write_space_record(&terminator, writer)?;

    let stack = &mut mem.spaces[space_index::STACK];
    stack.first_free_block = saved_first_free;
    stack.last_free_block = saved_last_free;
    Ok(())
}

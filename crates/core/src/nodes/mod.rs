//! Node kinds shipped with the engine. Image and file nodes are inert: they
//! never touch the filesystem and only record operations on the image log.

pub mod counter;
pub mod enhancer;
pub mod filter;
pub mod format;
pub mod print;
pub mod read_jpg;
pub mod save_jpg;
pub mod stack;

use anyhow::{bail, Result};

use crate::ports::PortSet;
use crate::types::{Image, PortData};

pub(crate) fn take_int(ports: &mut PortSet, input: &str) -> Result<i64> {
    match ports.take_input(input)? {
        PortData::Int(value) => Ok(value),
        other => bail!("input '{input}' expected INT, got {}", other.port_type()),
    }
}

pub(crate) fn take_str(ports: &mut PortSet, input: &str) -> Result<String> {
    match ports.take_input(input)? {
        PortData::Str(value) => Ok(value),
        other => bail!("input '{input}' expected STRING, got {}", other.port_type()),
    }
}

pub(crate) fn take_bool(ports: &mut PortSet, input: &str) -> Result<bool> {
    match ports.take_input(input)? {
        PortData::Bool(value) => Ok(value),
        other => bail!("input '{input}' expected BOOL, got {}", other.port_type()),
    }
}

pub(crate) fn take_image(ports: &mut PortSet, input: &str) -> Result<Image> {
    match ports.take_input(input)? {
        PortData::Image(image) => Ok(image),
        other => bail!("input '{input}' expected IMAGE, got {}", other.port_type()),
    }
}

//! Raw kernel ABI definitions.

#![allow(non_camel_case_types, non_snake_case)]

pub mod input;
pub mod uinput;

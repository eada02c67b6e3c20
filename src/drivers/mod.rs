//! Board peripherals behind the library's sensor traits.

pub mod lis3mdl;

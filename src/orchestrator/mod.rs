//! Emulation launch orchestration.
//!
//! Turns validated command line options into an emulator configuration, picks the
//! transports and hands the finished configuration to the engine. The CLI layer calls
//! into this module; the engine never sees raw options.

mod launch;

pub(crate) use launch::launch;

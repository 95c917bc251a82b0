// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

pub mod config;
pub mod dtm;
pub mod error;
pub mod geometry;
pub mod riscv;
pub mod sim;

pub use config::DtmConfig;
pub use dtm::handshake::{CommandPort, DtmTick, channel};
pub use dtm::target::DebugTarget;
pub use error::DtmError;

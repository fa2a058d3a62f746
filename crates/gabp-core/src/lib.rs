//! # gabp-core
//!
//! Core types and wire protocol for the Game Agent Bridge Protocol (GABP).
//!
//! This crate provides the pieces shared by servers and clients:
//! - Message envelope and variants (request / response / event)
//! - Error taxonomy and JSON-RPC style error codes
//! - Length-prefixed frame codec
//! - Tool descriptors and parameter metadata
//! - Handshake and capability types

pub mod codec;
pub mod error;
pub mod handshake;
pub mod message;
pub mod tool;

pub use codec::{encode, FrameDecoder, MAX_FRAME_LEN};
pub use error::{error_codes, GabpError, Result};
pub use handshake::{AppInfo, CapabilitySet, HelloParams, Platform, Welcome};
pub use message::{ErrorObject, Message, PROTOCOL_VERSION, SCHEMA_VERSION};
pub use tool::{ToolDescriptor, ToolParameter};

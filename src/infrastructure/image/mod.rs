//! Image handling infrastructure.
//!
//! This module provides:
//! - The shared registry of terminal statuses and in-flight probes
//! - An HTTP probe that checks a URL serves a decodable image

pub mod http_probe;
pub mod registry;

pub use http_probe::HttpImageProbe;
pub use registry::{Claim, FlightTicket, FlightWatch, ImageRegistry, RegistryStats};

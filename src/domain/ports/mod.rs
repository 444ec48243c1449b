mod image_probe_port;

pub use image_probe_port::ImageProbePort;

#[cfg(test)]
pub use image_probe_port::MockImageProbePort;

#[cfg(test)]
pub mod mocks {
    pub use super::image_probe_port::mock::ScriptedProbe;
}

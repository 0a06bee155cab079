//! Endpoint configuration state

use crate::{Error, EP0_MAX_PACKET_SIZE, MAX_ENDPOINTS, MAX_PACKET_SIZE};

/// How an endpoint is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointDirectionType {
    /// The endpoint is off.
    Disabled,
    /// Device to host.
    In,
    /// Host to device.
    Out,
    /// Bidirectional control. Only endpoint 0.
    Control,
}

/// Who may touch an OUT endpoint's FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoOwner {
    /// The controller may receive the next packet into the FIFO.
    Hardware,
    /// A received packet sits in the FIFO, and the controller NAKs
    /// until software releases it.
    Software,
}

/// Per-endpoint configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    pub(crate) max_packet_size: u16,
    pub(crate) direction_type: EndpointDirectionType,
    pub(crate) enabled: bool,
    pub(crate) stalled: bool,
    pub(crate) fifo_owner: FifoOwner,
    /// The packet in a software-owned FIFO was shorter than
    /// `max_packet_size` when it arrived.
    pub(crate) held_short: bool,
}

impl EndpointConfig {
    /// A disabled data endpoint
    pub(crate) const DISABLED: Self = EndpointConfig {
        max_packet_size: 0,
        direction_type: EndpointDirectionType::Disabled,
        enabled: false,
        stalled: false,
        fifo_owner: FifoOwner::Hardware,
        held_short: false,
    };

    /// Endpoint 0, always enabled
    pub(crate) const CONTROL: Self = EndpointConfig {
        max_packet_size: EP0_MAX_PACKET_SIZE,
        direction_type: EndpointDirectionType::Control,
        enabled: true,
        stalled: false,
        fifo_owner: FifoOwner::Hardware,
        held_short: false,
    };

    /// Validate a data endpoint configuration
    ///
    /// Endpoint 0 can't be configured, and a data endpoint can't act as
    /// a control endpoint.
    pub(crate) fn new(
        ep: usize,
        direction_type: EndpointDirectionType,
        max_packet_size: u16,
    ) -> Result<Self, Error> {
        if ep == 0 || ep >= MAX_ENDPOINTS {
            return Err(Error::InvalidEndpoint);
        }
        match direction_type {
            EndpointDirectionType::Disabled => Ok(Self::DISABLED),
            EndpointDirectionType::Control => Err(Error::InvalidEndpoint),
            EndpointDirectionType::In | EndpointDirectionType::Out => {
                if max_packet_size == 0 || max_packet_size > MAX_PACKET_SIZE {
                    return Err(Error::InvalidEndpoint);
                }
                Ok(EndpointConfig {
                    max_packet_size,
                    direction_type,
                    enabled: true,
                    stalled: false,
                    fifo_owner: FifoOwner::Hardware,
                    held_short: false,
                })
            }
        }
    }

    pub fn max_packet_size(&self) -> u16 {
        self.max_packet_size
    }

    pub fn direction_type(&self) -> EndpointDirectionType {
        self.direction_type
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    pub fn fifo_owner(&self) -> FifoOwner {
        self.fifo_owner
    }

    /// Returns `true` if a request for `direction` may run on this endpoint
    pub(crate) fn accepts(&self, direction: usb_device::UsbDirection) -> bool {
        use usb_device::UsbDirection;
        match (self.direction_type, direction) {
            (EndpointDirectionType::Control, _) => true,
            (EndpointDirectionType::In, UsbDirection::In) => true,
            (EndpointDirectionType::Out, UsbDirection::Out) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EndpointConfig, EndpointDirectionType, FifoOwner};
    use crate::Error;
    use usb_device::UsbDirection;

    #[test]
    fn reject_control_endpoint_changes() {
        assert_eq!(
            EndpointConfig::new(0, EndpointDirectionType::In, 64),
            Err(Error::InvalidEndpoint)
        );
        assert_eq!(
            EndpointConfig::new(1, EndpointDirectionType::Control, 64),
            Err(Error::InvalidEndpoint)
        );
    }

    #[test]
    fn reject_out_of_range() {
        assert_eq!(
            EndpointConfig::new(8, EndpointDirectionType::Out, 64),
            Err(Error::InvalidEndpoint)
        );
        assert_eq!(
            EndpointConfig::new(1, EndpointDirectionType::Out, 0),
            Err(Error::InvalidEndpoint)
        );
        assert_eq!(
            EndpointConfig::new(1, EndpointDirectionType::Out, 65),
            Err(Error::InvalidEndpoint)
        );
    }

    #[test]
    fn configured_endpoint() {
        let config = EndpointConfig::new(3, EndpointDirectionType::In, 16).unwrap();
        assert!(config.is_enabled());
        assert!(!config.is_stalled());
        assert_eq!(config.max_packet_size(), 16);
        assert_eq!(config.fifo_owner(), FifoOwner::Hardware);
        assert!(config.accepts(UsbDirection::In));
        assert!(!config.accepts(UsbDirection::Out));

        let disabled = EndpointConfig::new(3, EndpointDirectionType::Disabled, 0).unwrap();
        assert_eq!(disabled, EndpointConfig::DISABLED);
        assert!(!disabled.accepts(UsbDirection::In));
        assert!(EndpointConfig::CONTROL.accepts(UsbDirection::Out));
    }
}

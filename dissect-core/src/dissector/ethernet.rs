//! Ethernet II reference dissector.
//!
//! Claims the root layer of frames pushed with link type 1 and adds an `eth`
//! child layer tagged with the EtherType it carries (`eth.type.ipv4`, ...).

use etherparse::Ethernet2HeaderSlice;

use super::{Dissector, DissectorWorker, Status};
use crate::context::Context;
use crate::error::DissectError;
use crate::frame::link_layer_name;
use crate::layer::{Layer, Range};
use crate::token::Token;

/// Link type constant for Ethernet.
pub const LINKTYPE_ETHERNET: i32 = 1;

/// Well-known EtherType values (IEEE 802).
pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const WAKE_ON_LAN: u16 = 0x0842;
    pub const VLAN: u16 = 0x8100;
    pub const IPV6: u16 = 0x86DD;
    pub const EAP_OVER_LAN: u16 = 0x888E;

    /// Tag name for a known EtherType.
    pub fn tag_name(value: u16) -> Option<&'static str> {
        match value {
            IPV4 => Some("eth.type.ipv4"),
            ARP => Some("eth.type.arp"),
            WAKE_ON_LAN => Some("eth.type.wol"),
            VLAN => Some("eth.type.vlan"),
            IPV6 => Some("eth.type.ipv6"),
            EAP_OVER_LAN => Some("eth.type.eap"),
            _ => None,
        }
    }
}

/// Ethernet II dissector, registered as `"eth"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthernetDissector;

impl Dissector for EthernetDissector {
    fn id(&self) -> &str {
        "eth"
    }

    fn new_worker(&self, ctx: &Context) -> Box<dyn DissectorWorker> {
        Box::new(EthernetWorker {
            link: ctx.token(&link_layer_name(LINKTYPE_ETHERNET)),
            eth: ctx.token("eth"),
        })
    }
}

struct EthernetWorker {
    link: Token,
    eth: Token,
}

impl DissectorWorker for EthernetWorker {
    fn dissect(
        &mut self,
        ctx: &Context,
        data: &[u8],
        layer: &mut Layer,
    ) -> Result<Status, DissectError> {
        if layer.id() != self.link {
            return Ok(Status::Skip);
        }

        let bytes = layer
            .data(data)
            .ok_or_else(|| DissectError::malformed("eth", "root range outside payload"))?;
        let header = Ethernet2HeaderSlice::from_slice(bytes)
            .map_err(|e| DissectError::malformed("eth", e.to_string()))?;

        let range = layer.range();
        let mut eth = Layer::with_range(self.eth, Range::new(range.start, range.end));
        let ether_type = header.ether_type().0;
        if let Some(name) = ethertype::tag_name(ether_type) {
            eth.add_tag(ctx.token(name));
        }

        layer.add_child(eth);
        Ok(Status::Done)
    }
}

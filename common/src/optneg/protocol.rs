bitflags::bitflags! {
    /// Protocol flags configuring communications behavior
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct Protocol: u32 {
        /// MTA should not send connect info
        #[doc(alias = "SMFIP_NOCONNECT")]
        const NO_CONNECT = 0x0000_0001;
        /// MTA should not send HELO info
        #[doc(alias = "SMFIP_NOHELO")]
        const NO_HELO = 0x0000_0002;
        /// MTA should not send MAIL info
        #[doc(alias = "SMFIP_NOMAIL")]
        const NO_MAIL = 0x0000_0004;
        /// MTA should not send RCPT info
        #[doc(alias = "SMFIP_NORCPT")]
        const NO_RECIPIENT = 0x0000_0008;
        /// MTA should not send the body
        #[doc(alias = "SMFIP_NOBODY")]
        const NO_BODY = 0x0000_0010;
        /// MTA should not send headers
        #[doc(alias = "SMFIP_NOHDRS")]
        const NO_HEADER = 0x0000_0020;
        /// MTA should not send end-of-header
        #[doc(alias = "SMFIP_NOEOH")]
        const NO_END_OF_HEADER = 0x0000_0040;
        /// No reply expected for headers
        #[doc(alias = "SMFIP_NR_HDR")]
        const NR_HEADER = 0x0000_0080;
        /// MTA should not send unknown commands
        #[doc(alias = "SMFIP_NOUNKNOWN")]
        const NO_UNKNOWN = 0x0000_0100;
        /// MTA should not send DATA
        #[doc(alias = "SMFIP_NODATA")]
        const NO_DATA = 0x0000_0200;
        /// MTA understands SMFIS_SKIP
        const SMFIP_SKIP = 0x0000_0400;
        /// MTA should also send rejected RCPTs
        const SMFIP_RCPT_REJ = 0x0000_0800;
        /// No reply expected for connect
        #[doc(alias = "SMFIP_NR_CONN")]
        const NR_CONNECT = 0x0000_1000;
        /// No reply expected for HELO
        #[doc(alias = "SMFIP_NR_HELO")]
        const NR_HELO = 0x0000_2000;
        /// No reply expected for MAIL
        #[doc(alias = "SMFIP_NR_MAIL")]
        const NR_MAIL = 0x0000_4000;
        /// No reply expected for RCPT
        #[doc(alias = "SMFIP_NR_RCPT")]
        const NR_RECIPIENT = 0x0000_8000;
        /// No reply expected for DATA
        #[doc(alias = "SMFIP_NR_DATA")]
        const NR_DATA = 0x0001_0000;
        /// No reply expected for unknown commands
        #[doc(alias = "SMFIP_NR_UNKN")]
        const NR_UNKNOWN = 0x0002_0000;
        /// No reply expected for end-of-header
        #[doc(alias = "SMFIP_NR_EOH")]
        const NR_END_OF_HEADER = 0x0004_0000;
        /// No reply expected for a body chunk
        #[doc(alias = "SMFIP_NR_BODY")]
        const NR_BODY = 0x0008_0000;
        /// Header values keep their leading space
        const SMFIP_HDR_LEADSPC = 0x0010_0000;

        /// Suppress replies for every per-command stage.
        ///
        /// This endpoint accumulates silently and only answers negotiation
        /// and end-of-body.
        const NOREPLY_MASK = Self::NR_HEADER.bits()
            | Self::NR_CONNECT.bits()
            | Self::NR_HELO.bits()
            | Self::NR_MAIL.bits()
            | Self::NR_RECIPIENT.bits()
            | Self::NR_DATA.bits()
            | Self::NR_UNKNOWN.bits()
            | Self::NR_END_OF_HEADER.bits()
            | Self::NR_BODY.bits();
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_noreply_mask() {
        assert_eq!(Protocol::NOREPLY_MASK.bits(), 0x000F_F080);
    }
}

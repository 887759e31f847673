bitflags::bitflags! {
    /// Modification actions a milter may request from the MTA.
    ///
    /// Sendmail docs call these "actions".
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct Capability: u32 {
        /// Add headers (SMFIR_ADDHEADER)
        const SMFIF_ADDHDRS = 0x0000_0001;
        /// Change body chunks (SMFIR_REPLBODY)
        const SMFIF_CHGBODY = 0x0000_0002;
        /// Add recipients (SMFIR_ADDRCPT)
        const SMFIF_ADDRCPT = 0x0000_0004;
        /// Remove recipients (SMFIR_DELRCPT)
        const SMFIF_DELRCPT = 0x0000_0008;
        /// Change or delete headers (SMFIR_CHGHEADER)
        const SMFIF_CHGHDRS = 0x0000_0010;
        /// Quarantine message (SMFIR_QUARANTINE)
        const SMFIF_QUARANTINE = 0x0000_0020;
        /// Change the envelope sender (SMFIR_CHGFROM)
        const SMFIF_CHGFROM = 0x0000_0040;
        /// Add a recipient including ESMTP args (SMFIR_ADDRCPT_PAR)
        const SMFIF_ADDRCPT_PAR = 0x0000_0080;

        /// Everything this endpoint may ask of the MTA, or'ed into whatever
        /// the MTA offered during negotiation.
        const ACTIONS_MASK = Self::SMFIF_ADDHDRS.bits()
            | Self::SMFIF_CHGBODY.bits()
            | Self::SMFIF_ADDRCPT.bits()
            | Self::SMFIF_DELRCPT.bits()
            | Self::SMFIF_CHGHDRS.bits()
            | Self::SMFIF_QUARANTINE.bits()
            | Self::SMFIF_CHGFROM.bits();
    }
}

impl Default for Capability {
    /// Enables all capabilities per default
    fn default() -> Self {
        Capability::all()
    }
}

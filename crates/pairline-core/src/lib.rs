// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Pairline tenant gateway.
//!
//! This crate provides the trait definitions, error types, and common types
//! used throughout the Pairline workspace. Protocol clients, credential
//! stores, and inbound handlers implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{LinkError, PairlineError, SendError};
pub use types::{
    AdapterType, CloseReason, Credential, ErrorClass, FailureReason, HealthStatus, MessageId,
    SessionSnapshot, SessionState, Strategy, TenantId,
};

pub use traits::{
    CredentialStore, InboundHandler, LinkControl, PluginAdapter, ProtocolClient, ProtocolEvent,
    ProtocolLink,
};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pairline_error_has_all_variants() {
        let _config = PairlineError::Config("test".into());
        let _storage = PairlineError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _protocol = PairlineError::Protocol {
            message: "test".into(),
            source: None,
        };
        let _corrupt = PairlineError::CredentialCorrupt {
            tenant_id: "acme".into(),
            reason: "bad json".into(),
        };
        let _invalid = PairlineError::InvalidTenantId("../x".into());
        let _missing = PairlineError::SessionNotFound("acme".into());
        let _timeout = PairlineError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = PairlineError::Internal("test".into());
    }

    #[test]
    fn send_error_messages() {
        let err = SendError::NotConnected {
            state: SessionState::AwaitingPairing,
        };
        assert_eq!(
            err.to_string(),
            "session is not connected (state: awaiting_pairing)"
        );
    }

    #[test]
    fn link_error_close_reason_keeps_handshake_flag() {
        let err = LinkError::Protocol("socket hung up".into());
        let reason = err.close_reason(true);
        assert!(reason.during_handshake);
        assert_eq!(reason.code, None);

        let closed = LinkError::Closed(CloseReason {
            code: Some(401),
            message: "logged out".into(),
            during_handshake: false,
        });
        assert_eq!(closed.close_reason(true).code, Some(401));
        assert!(!closed.close_reason(true).during_handshake);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_protocol_client<T: ProtocolClient>() {}
        fn _assert_credential_store<T: CredentialStore>() {}
        fn _assert_inbound_handler<T: InboundHandler>() {}
        fn _assert_link_control<T: LinkControl>() {}
    }

    proptest! {
        #[test]
        fn safe_tenant_ids_round_trip(raw in "[A-Za-z0-9_-][A-Za-z0-9_.-]{0,63}") {
            let id = TenantId::parse(&raw).unwrap();
            prop_assert_eq!(id.as_str(), raw.as_str());
            prop_assert_eq!(id.to_string(), raw);
        }

        #[test]
        fn tenant_ids_with_separators_are_rejected(
            head in "[a-z]{1,8}",
            sep in "[/\\\\ ]",
            tail in "[a-z]{1,8}",
        ) {
            let raw = format!("{head}{sep}{tail}");
            prop_assert!(TenantId::parse(&raw).is_err());
        }
    }
}

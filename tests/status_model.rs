//! Property tests for the status and failure-info model

use proptest::prelude::*;

use cmp_session::status::{FailureBit, FailureInfo, PkiStatus, PkiStatusInfo};

proptest! {
    #[test]
    fn prop_status_code_and_name_round_trip(code in 0i64..=6) {
        let status = PkiStatus::from_code(code).unwrap();
        prop_assert_eq!(status.code(), code);
        prop_assert_eq!(status.name().parse::<PkiStatus>().unwrap(), status);
    }

    #[test]
    fn prop_unknown_status_codes_fail(code in 7i64..) {
        prop_assert!(PkiStatus::from_code(code).is_err());
    }

    #[test]
    fn prop_failure_bits_round_trip(bits in 0u32..(1 << 27)) {
        let info = FailureInfo::from_bits(bits).unwrap();
        prop_assert_eq!(info.bits(), bits);
        let rebuilt: FailureInfo = info.iter().collect();
        prop_assert_eq!(rebuilt, info);
    }

    #[test]
    fn prop_failure_bits_above_26_rejected(bits in (1u32 << 27)..) {
        prop_assert!(FailureInfo::from_bits(bits).is_err());
    }

    #[test]
    fn prop_rendering_parses_back(bits in 0u32..(1 << 27)) {
        let info = FailureInfo::from_bits(bits).unwrap();
        let rendered = info.to_string();
        let mut rebuilt = FailureInfo::EMPTY;
        for name in rendered.split(", ").filter(|s| !s.is_empty()) {
            let bit = FailureBit::ALL
                .into_iter()
                .find(|b| b.name() == name)
                .expect("rendered name is a known bit");
            rebuilt.insert(bit);
        }
        prop_assert_eq!(rebuilt, info);
    }

    #[test]
    fn prop_status_info_rendering_leads_with_status(code in 0i64..=6, bits in 0u32..(1 << 27)) {
        let status = PkiStatus::from_code(code).unwrap();
        let si = PkiStatusInfo {
            status,
            fail_info: FailureInfo::from_bits(bits).unwrap(),
            status_strings: vec!["detail".to_owned()],
        };
        let rendered = si.to_string();
        prop_assert!(rendered.starts_with(status.name()));
        prop_assert!(rendered.ends_with("StatusStrings: \"detail\""));
    }
}

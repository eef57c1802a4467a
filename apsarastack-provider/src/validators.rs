//! Attribute validators
//!
//! Each validator takes the attribute value and name and returns a
//! user-facing message on failure, the way the schema layer reports it.

use std::net::IpAddr;

use apsarastack_core::resource::Value;
use apsarastack_core::schema::Validator;

/// Smallest prefix length accepted for a VSwitch CIDR
pub const SWITCH_CIDR_MIN_PREFIX: u8 = 16;
/// Largest prefix length accepted for a VSwitch CIDR
pub const SWITCH_CIDR_MAX_PREFIX: u8 = 29;

/// Integer value within `[min, max]`, inclusive
pub fn int_between(min: i64, max: i64) -> Validator {
    Validator::new(move |value, key| {
        let Value::Int(v) = value else {
            return Err(format!("expected type of {} to be int", key));
        };

        if *v < min || *v > max {
            return Err(format!(
                "expected {} to be in the range ({} - {}), got {}",
                key, min, max, v
            ));
        }

        Ok(())
    })
}

/// String whose length in characters is within `[min, max]`
pub fn string_len_between(min: usize, max: usize) -> Validator {
    Validator::new(move |value, key| {
        let Value::String(v) = value else {
            return Err(format!("expected type of {} to be string", key));
        };

        let len = v.chars().count();
        if len < min || len > max {
            return Err(format!(
                "expected length of {} to be in the range ({} - {}), got {}",
                key, min, max, v
            ));
        }

        Ok(())
    })
}

/// CIDR whose text is already its network address (e.g. `10.0.0.0/8`, not `10.0.0.1/8`)
pub fn validate_cidr_network_address(value: &Value, key: &str) -> Result<(), String> {
    check_network_cidr(value, key).map(|_| ())
}

/// Network CIDR with a prefix length between 16 and 29
pub fn validate_switch_cidr_network_address(value: &Value, key: &str) -> Result<(), String> {
    let prefix = check_network_cidr(value, key)?;

    if !(SWITCH_CIDR_MIN_PREFIX..=SWITCH_CIDR_MAX_PREFIX).contains(&prefix) {
        return Err(format!(
            "{:?} must contain a network CIDR which mark between {} and {}",
            key, SWITCH_CIDR_MIN_PREFIX, SWITCH_CIDR_MAX_PREFIX
        ));
    }

    Ok(())
}

/// Validates the canonical network form and returns the prefix length
fn check_network_cidr(value: &Value, key: &str) -> Result<u8, String> {
    let Value::String(cidr) = value else {
        return Err(format!("expected type of {} to be string", key));
    };

    let (network, prefix) = parse_cidr(cidr).map_err(|e| {
        format!("{:?} must contain a valid CIDR, got error parsing: {}", key, e)
    })?;

    let canonical = format!("{}/{}", network, prefix);
    if &canonical != cidr {
        return Err(format!(
            "{:?} must contain a valid network CIDR, expected {:?}, got {:?}",
            key, canonical, cidr
        ));
    }

    Ok(prefix)
}

/// Parse `addr/prefix` and return the masked network address with its prefix length
fn parse_cidr(cidr: &str) -> Result<(IpAddr, u8), String> {
    let invalid = || format!("invalid CIDR address: {}", cidr);

    let (addr, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
    let addr: IpAddr = addr.parse().map_err(|_| invalid())?;

    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;

    let network = match addr {
        IpAddr::V4(v4) => {
            if prefix > 32 {
                return Err(invalid());
            }
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
            IpAddr::from((u32::from(v4) & mask).to_be_bytes())
        }
        IpAddr::V6(v6) => {
            if prefix > 128 {
                return Err(invalid());
            }
            let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
            IpAddr::from((u128::from(v6) & mask).to_be_bytes())
        }
    };

    Ok((network, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    #[test]
    fn int_between_bounds() {
        let validate = int_between(1, 10);
        assert!(validate.check(&Value::Int(5), "priority").is_ok());
        assert!(validate.check(&Value::Int(1), "priority").is_ok());
        assert!(validate.check(&Value::Int(10), "priority").is_ok());
        assert_eq!(
            validate.check(&Value::Int(0), "priority").unwrap_err(),
            "expected priority to be in the range (1 - 10), got 0"
        );
        assert!(validate.check(&Value::Int(11), "priority").is_err());
    }

    #[test]
    fn int_between_rejects_non_int() {
        let validate = int_between(1, 10);
        assert_eq!(
            validate.check(&s("5"), "priority").unwrap_err(),
            "expected type of priority to be int"
        );
    }

    #[test]
    fn string_len_between_bounds() {
        let validate = string_len_between(0, 4);
        assert!(validate.check(&s(""), "label").is_ok());
        assert!(validate.check(&s("abcd"), "label").is_ok());
        assert_eq!(
            validate.check(&s("abcde"), "label").unwrap_err(),
            "expected length of label to be in the range (0 - 4), got abcde"
        );
        assert!(validate.check(&Value::Int(1), "label").is_err());
    }

    #[test]
    fn cidr_network_address() {
        assert!(validate_cidr_network_address(&s("10.0.0.0/8"), "cidr_block").is_ok());
        assert!(validate_cidr_network_address(&s("172.16.0.0/12"), "cidr_block").is_ok());
        assert!(validate_cidr_network_address(&s("0.0.0.0/0"), "cidr_block").is_ok());
        assert!(validate_cidr_network_address(&s("192.168.1.1/32"), "cidr_block").is_ok());
        assert!(validate_cidr_network_address(&s("2001:db8::/32"), "cidr_block").is_ok());
    }

    #[test]
    fn cidr_with_host_bits_is_rejected() {
        let err = validate_cidr_network_address(&s("10.0.0.1/24"), "cidr_block").unwrap_err();
        assert_eq!(
            err,
            "\"cidr_block\" must contain a valid network CIDR, expected \"10.0.0.0/24\", got \"10.0.0.1/24\""
        );
    }

    #[test]
    fn unparsable_cidr_is_rejected() {
        let err = validate_cidr_network_address(&s("10.0.0.0"), "cidr_block").unwrap_err();
        assert_eq!(
            err,
            "\"cidr_block\" must contain a valid CIDR, got error parsing: invalid CIDR address: 10.0.0.0"
        );

        for bad in ["10.0.0.0/33", "10.0.0.256/16", "10.0.0/16", "10.0.0.0/+8", "invalid"] {
            let err = validate_cidr_network_address(&s(bad), "cidr_block").unwrap_err();
            assert!(err.contains("must contain a valid CIDR"), "{}", bad);
        }
    }

    #[test]
    fn non_canonical_prefix_text_is_rejected() {
        let err = validate_cidr_network_address(&s("10.0.0.0/08"), "cidr_block").unwrap_err();
        assert!(err.contains("expected \"10.0.0.0/8\""));
    }

    #[test]
    fn switch_cidr_prefix_range() {
        assert!(validate_switch_cidr_network_address(&s("172.16.0.0/16"), "cidr_block").is_ok());
        assert!(validate_switch_cidr_network_address(&s("172.16.1.0/24"), "cidr_block").is_ok());
        assert!(validate_switch_cidr_network_address(&s("172.16.1.8/29"), "cidr_block").is_ok());

        for out_of_range in ["10.0.0.0/8", "172.16.0.0/15", "172.16.1.0/30", "172.16.1.1/32"] {
            let err =
                validate_switch_cidr_network_address(&s(out_of_range), "cidr_block").unwrap_err();
            assert_eq!(
                err,
                "\"cidr_block\" must contain a network CIDR which mark between 16 and 29",
                "{}",
                out_of_range
            );
        }
    }

    #[test]
    fn switch_cidr_still_requires_canonical_form() {
        let err = validate_switch_cidr_network_address(&s("172.16.1.1/24"), "cidr_block")
            .unwrap_err();
        assert!(err.contains("must contain a valid network CIDR"));
    }
}

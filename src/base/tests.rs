use crate::base::neterror::NetError;
use std::io;

#[test]
fn test_net_error_roundtrip() {
    let original = NetError::ConnectionRefused;
    let code = original.as_i32();
    assert_eq!(code, -102);
    let converted = NetError::from(code);
    assert!(matches!(converted, NetError::ConnectionRefused));

    let cancelled = NetError::Cancelled;
    assert_eq!(cancelled.as_i32(), -3);
    assert!(NetError::from(-3).is_cancelled());
}

#[test]
fn test_unknown_error() {
    let err = NetError::from(-9999);
    assert!(matches!(err, NetError::Unknown(-9999)));
    assert_eq!(err.as_i32(), -9999);
}

#[test]
fn test_contextual_errors_share_base_code() {
    let err = NetError::dns_failed("example.invalid", io::Error::from(io::ErrorKind::NotFound));
    assert_eq!(err.as_i32(), NetError::NameNotResolved.as_i32());
    assert!(err.is_resolution_failure());

    let err = NetError::connection_failed_to(
        "example.com",
        443,
        io::Error::from(io::ErrorKind::ConnectionRefused),
    );
    assert_eq!(err.as_i32(), NetError::ConnectionFailed.as_i32());
    assert!(!err.is_resolution_failure());
    assert_eq!(err.to_string(), "Connection to example.com:443 failed: connection refused");
}

#[test]
fn test_io_error_mapping() {
    let refused: NetError = io::Error::from(io::ErrorKind::ConnectionRefused).into();
    assert!(matches!(refused, NetError::ConnectionRefused));

    let timed_out: NetError = io::Error::from(io::ErrorKind::TimedOut).into();
    assert!(matches!(timed_out, NetError::ConnectionTimedOut));

    let other: NetError = io::Error::other("boom").into();
    assert!(matches!(other, NetError::ConnectionFailed));
}

mod argv;
mod capture;
mod search;

use crate::{Capture, CaptureBuffer, CaptureConfig, ExecError, ExitStatus, ProcessHandle};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn public_types_are_send_and_sync() {
    assert_send_sync::<Capture>();
    assert_send_sync::<CaptureBuffer>();
    assert_send_sync::<CaptureConfig>();
    assert_send_sync::<ExecError>();
    assert_send_sync::<ExitStatus>();
    assert_send_sync::<ProcessHandle>();
}

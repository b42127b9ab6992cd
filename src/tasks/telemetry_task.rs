use core::fmt::Write;

use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker};

use linefollower_rust::state::{ControlStatus, SensorFrame};

use crate::usb::{UsbSender, PACKET_SIZE};
use crate::{FRAME_TAP, REPLIES, STATUS};

const TELEMETRY_HZ: u64 = 10;

/// USB output: `[LF]`/`[LS]` lines at 10 Hz plus console replies.
/// Nothing is written while the host has the port closed (no DTR).
#[task]
pub async fn telemetry_task(mut usb_tx: UsbSender) {
    let mut status = ControlStatus::default();
    let mut frame = SensorFrame::default();

    let mut ticker = Ticker::every(Duration::from_hz(TELEMETRY_HZ));

    loop {
        match select(ticker.next(), REPLIES.receive()).await {
            Either::First(()) => {}
            Either::Second(line) => {
                if usb_tx.dtr() {
                    write_line(&mut usb_tx, line.as_bytes()).await;
                }
                continue;
            }
        }

        // Refresh from channels (non-blocking)
        if let Ok(s) = STATUS.try_receive() { status = s; }
        if let Ok(f) = FRAME_TAP.try_receive() { frame = f; }

        if !usb_tx.dtr() {
            continue;
        }

        let mut m = heapless::String::<64>::new();
        let _ = write!(m,
            "[LF] {} yaw={:.3} thr={:.2} dt={:.4}\r\n",
            status.status.as_str(), status.yaw_rate, status.throttle, status.dt
        );
        write_line(&mut usb_tx, m.as_bytes()).await;

        let r = &frame.raw;
        let mut m = heapless::String::<64>::new();
        let _ = write!(m,
            "[LS] raw={},{},{},{},{},{}\r\n",
            r[0], r[1], r[2], r[3], r[4], r[5]
        );
        write_line(&mut usb_tx, m.as_bytes()).await;

        let mut m = heapless::String::<64>::new();
        let _ = write!(m,
            "[LS] pos={:.3} {} min={:.0} max={:.0}\r\n",
            frame.position, frame.track.as_str(), frame.bounds.min, frame.bounds.max
        );
        write_line(&mut usb_tx, m.as_bytes()).await;
    }
}

/// Split into packets; a full last packet is closed with a zero-length one.
async fn write_line(usb_tx: &mut UsbSender, bytes: &[u8]) {
    let max = PACKET_SIZE as usize;
    for chunk in bytes.chunks(max) {
        if usb_tx.write_packet(chunk).await.is_err() {
            return;
        }
    }
    if !bytes.is_empty() && bytes.len() % max == 0 {
        let _ = usb_tx.write_packet(&[]).await;
    }
}

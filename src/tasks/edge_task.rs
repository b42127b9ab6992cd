use core::pin::pin;

use embassy_executor::task;
use embassy_futures::poll_once;
use embassy_futures::select::select_array;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::AnyPin;

use linefollower_rust::state::NUM_SENSOR;

use crate::Sensor;

/// Latches discharge times. Runs on the interrupt executor, so it preempts
/// the sensor task between any two of its register accesses.
#[task]
pub async fn edge_task(sensor: &'static Sensor, mut lines: [ExtiInput<'static, AnyPin>; NUM_SENSOR]) {
    loop {
        {
            let [l0, l1, l2, l3, l4, l5] = &mut lines;
            let mut edges = pin!(select_array([
                l0.wait_for_falling_edge(),
                l1.wait_for_falling_edge(),
                l2.wait_for_falling_edge(),
                l3.wait_for_falling_edge(),
                l4.wait_for_falling_edge(),
                l5.wait_for_falling_edge(),
            ]));
            // The lines are only unmasked on the first poll. Anything that
            // fell since the previous scan raised no interrupt, so scan again
            // once they are armed.
            if poll_once(edges.as_mut()).is_pending() {
                sensor.on_edge_event();
                edges.await;
            }
        }
        // One edge may stand for several lines; the handler scans them all.
        sensor.on_edge_event();
    }
}

use embassy_stm32::pac;
use embassy_stm32::pac::gpio::vals;
use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::Config;

use linefollower_rust::drivers::linesensor::{LineMode, LineSensorHal};

/// Sensor array on PC0..PC5, channel 0 on PC0.
pub const LINE_PINS: [u8; 6] = [0, 1, 2, 3, 4, 5];

/// TIM4 prescaler for a 1 MHz count from the 84 MHz APB1 timer clock.
const COUNTER_PRESCALER: u16 = 83;

pub struct Board {
    pub p: embassy_stm32::Peripherals,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(Hse {
            freq: TimeHertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2), // 168 MHz
            divq: Some(PllQDiv::DIV7), // 48 MHz for USB
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;

        let p = embassy_stm32::init(config);

        Self { p }
    }
}

/// Register-level access to the sensor lines and the shared counter.
///
/// The edge task owns the pins as `ExtiInput`s; mode switches and line
/// writes here go straight to MODER/BSRR. Only the sensor task writes
/// those, the edge handler only reads IDR and the counter.
pub struct LineSensorBoard {
    _private: (),
}

impl LineSensorBoard {
    /// Start TIM4 free-running at 1 MHz.
    pub fn new() -> Self {
        pac::RCC.apb1enr().modify(|w| w.set_tim4en(true));

        let tim = pac::TIM4;
        tim.cr1().modify(|w| w.set_cen(false));
        tim.psc().write(|w| w.set_psc(COUNTER_PRESCALER));
        tim.arr().write(|w| w.set_arr(0xFFFF));
        tim.egr().write(|w| w.set_ug(true));
        tim.cr1().modify(|w| w.set_cen(true));

        Self { _private: () }
    }
}

impl LineSensorHal for LineSensorBoard {
    fn is_valid_pin(&self, pin: u8) -> bool {
        LINE_PINS.contains(&pin)
    }

    fn set_pin_mode(&self, pin: u8, mode: LineMode) {
        let moder = match mode {
            LineMode::Input => vals::Moder::INPUT,
            LineMode::Output => vals::Moder::OUTPUT,
        };
        pac::GPIOC
            .moder()
            .modify(|w| w.set_moder(pin as usize, moder));
    }

    fn write_pin(&self, pin: u8, high: bool) {
        let n = pin as usize;
        pac::GPIOC.bsrr().write(|w| {
            if high {
                w.set_bs(n, true)
            } else {
                w.set_br(n, true)
            }
        });
    }

    fn read_pin(&self, pin: u8) -> bool {
        pac::GPIOC.idr().read().idr(pin as usize) == vals::Idr::HIGH
    }

    fn read_counter(&self) -> u16 {
        pac::TIM4.cnt().read().cnt()
    }
}

//! Procedural animation effects.
//!
//! Each channel in an effect mode owns one [`FxSegment`]: a few counters,
//! an 8-bit PRNG and a deadline. Every render tick the scheduler offers the
//! segment a chance to run; the segment re-renders only when its deadline
//! has passed and otherwise leaves the canvas untouched, so a 970 ms
//! "breath" pause costs nothing at a 100 Hz tick rate.
//!
//! Mode timings are returned in milliseconds and quantized to the 10 ms
//! scheduler tick; anything faster than one tick re-renders every tick.

pub mod palette;

use serde::{Deserialize, Serialize};

use crate::render::pacer::TICK_MS;
use palette::{
    BLACK, BLUE, GREEN, ORANGE, PURPLE, RED, Rand8, WHITE, color_blend, color_wheel, sine8,
};

/// Where a segment renders to. One sink per channel, handed in by the
/// scheduler; tests substitute a buffer.
pub trait PixelSink {
    fn set(&mut self, index: u16, r: u8, g: u8, b: u8);
}

/// Animation selector for a channel in effect mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FxMode {
    Static,
    Blink,
    Breath,
    ColorWipe,
    ColorWipeInv,
    ColorWipeRev,
    ColorWipeRevInv,
    ColorWipeRandom,
    RandomColor,
    SingleDynamic,
    MultiDynamic,
    Rainbow,
    RainbowCycle,
    Scan,
    DualScan,
    Fade,
    TheaterChase,
    TheaterChaseRainbow,
    RunningLights,
    Twinkle,
    TwinkleRandom,
    Sparkle,
    FlashSparkle,
    HyperSparkle,
    Strobe,
    StrobeRainbow,
    MultiStrobe,
    BlinkRainbow,
    ChaseWhite,
    ChaseColor,
    ChaseRandom,
    ChaseRainbow,
    ChaseFlash,
    ChaseFlashRandom,
    ChaseRainbowWhite,
    ChaseBlackout,
    ChaseBlackoutRainbow,
    ColorSweepRandom,
    RunningColor,
    RunningRedBlue,
    MerryChristmas,
    FireFlicker,
    FireFlickerSoft,
    FireFlickerIntense,
    CircusCombustus,
    Halloween,
    BicolorChase,
    TricolorChase,
    Icu,
}

const DEFAULT_SPEED: u32 = 1000;

/// Animation state for one channel.
///
/// Created fresh whenever the channel's mode or pixel count changes; all
/// counters restart from zero.
#[derive(Debug, Clone)]
pub struct FxSegment {
    mode: FxMode,
    len: u16,
    speed: u32,
    reverse: bool,
    colors: [u32; 3],
    next_time: u64,
    step: u32,
    call_count: u32,
    aux_color: u8,
    aux_index: u16,
    rng: Rand8,
}

impl FxSegment {
    pub fn new(mode: FxMode, len: u16) -> Self {
        FxSegment {
            mode,
            len,
            speed: DEFAULT_SPEED,
            reverse: false,
            colors: [RED, GREEN, BLUE],
            next_time: 0,
            step: 0,
            call_count: 0,
            aux_color: 0,
            aux_index: 0,
            rng: Rand8::default(),
        }
    }

    pub fn mode(&self) -> FxMode {
        self.mode
    }

    pub fn len(&self) -> u16 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base cycle time in milliseconds.
    pub fn set_speed(&mut self, ms: u32) {
        self.speed = ms;
    }

    pub fn set_colors(&mut self, colors: [u32; 3]) {
        self.colors = colors;
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    /// Reseed the PRNG, mainly for reproducible tests.
    pub fn set_seed(&mut self, seed: u16) {
        self.rng = Rand8::new(seed);
    }

    /// Run the mode function if its deadline has passed. `now` is the
    /// scheduler's tick counter.
    pub fn tick<S: PixelSink>(&mut self, now: u64, sink: &mut S) {
        if self.len == 0 {
            return;
        }
        if self.call_count == 0 {
            let delay = self.run(sink);
            self.next_time = now + u64::from(delay) / TICK_MS;
            self.call_count += 1;
        } else if now >= self.next_time {
            let delay = self.run(sink);
            self.next_time += u64::from(delay) / TICK_MS;
            self.call_count += 1;
        }
    }

    /// Render one animation step, returning the delay until the next one.
    fn run<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        match self.mode {
            FxMode::Static => self.static_color(sink),
            FxMode::Blink => self.blink(sink, self.colors[0], self.colors[1], false),
            FxMode::Breath => self.breath(sink),
            FxMode::ColorWipe => self.color_wipe(sink, self.colors[0], self.colors[1], false),
            FxMode::ColorWipeInv => self.color_wipe(sink, self.colors[1], self.colors[0], false),
            FxMode::ColorWipeRev => self.color_wipe(sink, self.colors[0], self.colors[1], true),
            FxMode::ColorWipeRevInv => self.color_wipe(sink, self.colors[1], self.colors[0], true),
            FxMode::ColorWipeRandom => self.color_wipe_random(sink, false),
            FxMode::RandomColor => self.random_color(sink),
            FxMode::SingleDynamic => self.single_dynamic(sink),
            FxMode::MultiDynamic => self.multi_dynamic(sink),
            FxMode::Rainbow => self.rainbow(sink),
            FxMode::RainbowCycle => self.rainbow_cycle(sink),
            FxMode::Scan => self.scan(sink, false),
            FxMode::DualScan => self.scan(sink, true),
            FxMode::Fade => self.fade(sink),
            FxMode::TheaterChase => {
                self.theater_chase(sink, self.colors[0], self.colors[1])
            }
            FxMode::TheaterChaseRainbow => self.theater_chase_rainbow(sink),
            FxMode::RunningLights => self.running_lights(sink),
            FxMode::Twinkle => self.twinkle(sink, self.colors[0], self.colors[1]),
            FxMode::TwinkleRandom => {
                let w = self.rng.next();
                self.twinkle(sink, color_wheel(w), self.colors[1])
            }
            FxMode::Sparkle => self.sparkle(sink),
            FxMode::FlashSparkle => self.flash_sparkle(sink),
            FxMode::HyperSparkle => self.hyper_sparkle(sink),
            FxMode::Strobe => self.blink(sink, self.colors[0], self.colors[1], true),
            FxMode::StrobeRainbow => {
                self.blink(sink, color_wheel((self.call_count & 0xFF) as u8), self.colors[1], true)
            }
            FxMode::MultiStrobe => self.multi_strobe(sink),
            FxMode::BlinkRainbow => {
                self.blink(sink, color_wheel((self.call_count & 0xFF) as u8), self.colors[1], false)
            }
            FxMode::ChaseWhite => self.chase(sink, WHITE, self.colors[0], self.colors[0]),
            FxMode::ChaseColor => self.chase(sink, self.colors[0], WHITE, WHITE),
            FxMode::ChaseRandom => self.chase_random(sink),
            FxMode::ChaseRainbow => self.chase_rainbow(sink, WHITE),
            FxMode::ChaseFlash => self.chase_flash(sink),
            FxMode::ChaseFlashRandom => self.chase_flash_random(sink),
            FxMode::ChaseRainbowWhite => self.chase_rainbow_white(sink),
            FxMode::ChaseBlackout => self.chase(sink, self.colors[0], BLACK, BLACK),
            FxMode::ChaseBlackoutRainbow => self.chase_rainbow(sink, BLACK),
            FxMode::ColorSweepRandom => self.color_wipe_random(sink, true),
            FxMode::RunningColor => self.running(sink, self.colors[0], WHITE),
            FxMode::RunningRedBlue => self.running(sink, RED, BLUE),
            FxMode::MerryChristmas => self.running(sink, RED, GREEN),
            FxMode::Halloween => self.running(sink, PURPLE, ORANGE),
            FxMode::FireFlicker => self.fire_flicker(sink, 3),
            FxMode::FireFlickerSoft => self.fire_flicker(sink, 6),
            FxMode::FireFlickerIntense => self.fire_flicker(sink, 1),
            FxMode::CircusCombustus => self.tricolor_chase(sink, RED, WHITE, BLACK),
            FxMode::BicolorChase => {
                self.chase(sink, self.colors[0], self.colors[1], self.colors[2])
            }
            FxMode::TricolorChase => {
                self.tricolor_chase(sink, self.colors[0], self.colors[1], self.colors[2])
            }
            FxMode::Icu => self.icu(sink),
        }
    }

    fn set<S: PixelSink>(&self, sink: &mut S, i: u16, color: u32) {
        if i < self.len {
            sink.set(i, (color >> 16) as u8, (color >> 8) as u8, color as u8);
        }
    }

    fn set_rgb<S: PixelSink>(&self, sink: &mut S, i: u16, r: u8, g: u8, b: u8) {
        if i < self.len {
            sink.set(i, r, g, b);
        }
    }

    fn fill<S: PixelSink>(&self, sink: &mut S, color: u32) {
        for i in 0..self.len {
            self.set(sink, i, color);
        }
    }

    fn len32(&self) -> u32 {
        u32::from(self.len)
    }

    fn static_color<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        self.fill(sink, self.colors[0]);
        500
    }

    fn blink<S: PixelSink>(&mut self, sink: &mut S, c1: u32, c2: u32, strobe: bool) -> u32 {
        let on_phase = self.call_count & 1 == 0;
        let mut color = if on_phase { c1 } else { c2 };
        if self.reverse {
            color = if color == c1 { c2 } else { c1 };
        }
        self.fill(sink, color);

        match (on_phase, strobe) {
            (true, true) => 20,
            (false, true) => self.speed.saturating_sub(20),
            (_, false) => self.speed / 2,
        }
    }

    fn color_wipe<S: PixelSink>(&mut self, sink: &mut S, c1: u32, c2: u32, rev: bool) -> u32 {
        let len = self.len32();
        if self.step < len {
            let off = self.step as u16;
            let i = if self.reverse { self.len - 1 - off } else { off };
            self.set(sink, i, c1);
        } else {
            let off = (self.step - len) as u16;
            let i = if self.reverse != rev { self.len - 1 - off } else { off };
            self.set(sink, i, c2);
        }
        self.step = (self.step + 1) % (len * 2);
        self.speed / (len * 2)
    }

    fn color_wipe_random<S: PixelSink>(&mut self, sink: &mut S, sweep: bool) -> u32 {
        if self.step % self.len32() == 0 {
            self.aux_color = self.rng.wheel_away_from(self.aux_color);
        }
        let color = color_wheel(self.aux_color);
        self.color_wipe(sink, color, color, sweep) * 2
    }

    fn random_color<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        self.aux_color = self.rng.wheel_away_from(self.aux_color);
        self.fill(sink, color_wheel(self.aux_color));
        self.speed
    }

    fn single_dynamic<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        if self.call_count == 0 {
            for i in 0..self.len {
                let w = self.rng.next();
                self.set(sink, i, color_wheel(w));
            }
        }
        let i = self.rng.index(self.len);
        let w = self.rng.next();
        self.set(sink, i, color_wheel(w));
        self.speed
    }

    fn multi_dynamic<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        for i in 0..self.len {
            let w = self.rng.next();
            self.set(sink, i, color_wheel(w));
        }
        self.speed
    }

    fn breath<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        let mut lum = self.step;
        if lum > 255 {
            lum = 511 - lum;
        }

        let delay = match lum {
            15 => 970,
            l if l <= 25 => 38,
            l if l <= 50 => 36,
            l if l <= 75 => 28,
            l if l <= 100 => 20,
            l if l <= 125 => 14,
            l if l <= 150 => 11,
            _ => 10,
        };

        let c = self.colors[0];
        let r = (((c >> 16) & 0xFF) * lum / 256) as u8;
        let g = (((c >> 8) & 0xFF) * lum / 256) as u8;
        let b = ((c & 0xFF) * lum / 256) as u8;
        for i in 0..self.len {
            self.set_rgb(sink, i, r, g, b);
        }

        self.step += 2;
        if self.step > 512 - 15 {
            self.step = 15;
        }
        delay
    }

    fn fade<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        let lum = if self.step > 255 { 511 - self.step } else { self.step };
        let color = color_blend(self.colors[0], self.colors[1], lum as u8);
        self.fill(sink, color);

        self.step += 4;
        if self.step > 511 {
            self.step = 0;
        }
        self.speed / 128
    }

    fn scan<S: PixelSink>(&mut self, sink: &mut S, dual: bool) -> u32 {
        let len = self.len32();
        if i64::from(self.step) > i64::from(len) * 2 - 3 {
            self.step = 0;
        }

        self.fill(sink, self.colors[1]);

        let offset = (i64::from(self.step) - (i64::from(len) - 1)).unsigned_abs() as u16;
        if dual {
            self.set(sink, offset, self.colors[0]);
            self.set(sink, self.len - 1 - offset, self.colors[0]);
        } else {
            let i = if self.reverse { self.len - 1 - offset } else { offset };
            self.set(sink, i, self.colors[0]);
        }

        self.step += 1;
        self.speed / (len * 2)
    }

    fn rainbow<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        self.fill(sink, color_wheel(self.step as u8));
        self.step = (self.step + 1) & 0xFF;
        self.speed / 256
    }

    fn rainbow_cycle<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        let len = self.len32();
        for i in 0..self.len {
            let pos = (u32::from(i) * 256 / len + self.step) & 0xFF;
            self.set(sink, i, color_wheel(pos as u8));
        }
        self.step = (self.step + 1) & 0xFF;
        self.speed / 256
    }

    fn theater_chase<S: PixelSink>(&mut self, sink: &mut S, c1: u32, c2: u32) -> u32 {
        self.call_count %= 3;
        for i in 0..self.len {
            let color = if u32::from(i % 3) == self.call_count { c1 } else { c2 };
            let idx = if self.reverse { self.len - 1 - i } else { i };
            self.set(sink, idx, color);
        }
        self.speed / self.len32()
    }

    fn theater_chase_rainbow<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        self.step = (self.step + 1) & 0xFF;
        self.theater_chase(sink, color_wheel(self.step as u8), BLACK)
    }

    fn running_lights<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        let c = self.colors[0];
        let (r, g, b) = ((c >> 16) & 0xFF, (c >> 8) & 0xFF, c & 0xFF);
        let sine_incr = ((256 / self.len32()).max(1) & 0xFF) as u8;

        for i in 0..self.len {
            let phase = (u32::from(i) + self.step).wrapping_mul(u32::from(sine_incr));
            let lum = u32::from(sine8(phase as u8));
            let idx = if self.reverse { i } else { self.len - 1 - i };
            self.set_rgb(
                sink,
                idx,
                (r * lum / 256) as u8,
                (g * lum / 256) as u8,
                (b * lum / 256) as u8,
            );
        }
        self.step = (self.step + 1) % 256;
        self.speed / self.len32()
    }

    fn twinkle<S: PixelSink>(&mut self, sink: &mut S, c1: u32, c2: u32) -> u32 {
        if self.step == 0 {
            self.fill(sink, c2);
            let min = (self.len / 5).max(1);
            let max = (self.len / 2).max(1);
            self.step = u32::from(min + self.rng.index(max - min + 1));
        }

        let i = self.rng.index(self.len);
        self.set(sink, i, c1);

        self.step -= 1;
        self.speed / self.len32()
    }

    fn sparkle<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        self.set(sink, self.aux_index, self.colors[1]);
        self.aux_index = self.rng.index(self.len);
        self.set(sink, self.aux_index, self.colors[0]);
        self.speed / self.len32()
    }

    fn flash_sparkle<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        if self.call_count == 0 {
            self.fill(sink, self.colors[0]);
        }

        self.set(sink, self.aux_index, self.colors[0]);

        if self.rng.below(5) == 0 {
            self.aux_index = self.rng.index(self.len);
            self.set(sink, self.aux_index, WHITE);
            20
        } else {
            self.speed
        }
    }

    fn hyper_sparkle<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        self.fill(sink, self.colors[0]);

        if self.rng.below(5) < 2 {
            for _ in 0..(self.len / 3).max(1) {
                let i = self.rng.index(self.len);
                self.set(sink, i, WHITE);
            }
            20
        } else {
            self.speed
        }
    }

    fn multi_strobe<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        self.fill(sink, BLACK);

        let mut delay = 200 + (9 - self.speed % 10) * 100;
        let count = 2 * (self.speed / 100 + 1);
        if self.step < count {
            if self.step & 1 == 0 {
                self.fill(sink, self.colors[0]);
                delay = 20;
            } else {
                delay = 50;
            }
        }
        self.step = (self.step + 1) % (count + 1);
        delay
    }

    fn chase<S: PixelSink>(&mut self, sink: &mut S, c1: u32, c2: u32, c3: u32) -> u32 {
        let a = self.step as u16;
        let b = ((u32::from(a) + 1) % self.len32()) as u16;
        let c = ((u32::from(b) + 1) % self.len32()) as u16;
        if self.reverse {
            self.set(sink, self.len - 1 - a, c1);
            self.set(sink, self.len - 1 - b, c2);
            self.set(sink, self.len - 1 - c, c3);
        } else {
            self.set(sink, a, c1);
            self.set(sink, b, c2);
            self.set(sink, c, c3);
        }

        self.step = (self.step + 1) % self.len32();
        self.speed / self.len32()
    }

    fn chase_random<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        if self.step == 0 {
            self.aux_color = self.rng.wheel_away_from(self.aux_color);
        }
        self.chase(sink, color_wheel(self.aux_color), WHITE, WHITE)
    }

    fn chase_rainbow<S: PixelSink>(&mut self, sink: &mut S, runner: u32) -> u32 {
        let color_sep = (256 / self.len32()) as u8;
        let color_index = (self.call_count & 0xFF) as u8;
        let pos = self
            .step
            .wrapping_mul(u32::from(color_sep))
            .wrapping_add(u32::from(color_index))
            & 0xFF;
        let color = color_wheel(pos as u8);
        self.chase(sink, color, runner, runner)
    }

    fn chase_rainbow_white<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        let len = self.len32();
        let n = self.step;
        let m = (self.step + 1) % len;
        let base = self.call_count & 0xFF;
        let c2 = color_wheel(((n * 256 / len + base) & 0xFF) as u8);
        let c3 = color_wheel(((m * 256 / len + base) & 0xFF) as u8);
        self.chase(sink, WHITE, c2, c3)
    }

    fn chase_flash<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        const FLASH_COUNT: u32 = 4;
        let flash_step = self.call_count % (FLASH_COUNT * 2 + 1);

        self.fill(sink, self.colors[0]);

        let mut delay = self.speed / self.len32();
        if flash_step < FLASH_COUNT * 2 {
            if flash_step % 2 == 0 {
                let n = self.step as u16;
                let m = ((self.step + 1) % self.len32()) as u16;
                if self.reverse {
                    self.set(sink, self.len - 1 - n, WHITE);
                    self.set(sink, self.len - 1 - m, WHITE);
                } else {
                    self.set(sink, n, WHITE);
                    self.set(sink, m, WHITE);
                }
                delay = 20;
            } else {
                delay = 30;
            }
        } else {
            self.step = (self.step + 1) % self.len32();
        }
        delay
    }

    fn chase_flash_random<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        const FLASH_COUNT: u32 = 4;
        let flash_step = self.call_count % (FLASH_COUNT * 2 + 1);

        for i in 0..self.step as u16 {
            self.set(sink, i, color_wheel(self.aux_color));
        }

        let mut delay = self.speed / self.len32();
        if flash_step < FLASH_COUNT * 2 {
            let n = self.step as u16;
            let m = ((self.step + 1) % self.len32()) as u16;
            if flash_step % 2 == 0 {
                self.set(sink, n, WHITE);
                self.set(sink, m, WHITE);
                delay = 20;
            } else {
                self.set(sink, n, color_wheel(self.aux_color));
                self.set(sink, m, BLACK);
                delay = 30;
            }
        } else {
            self.step = (self.step + 1) % self.len32();
            if self.step == 0 {
                self.aux_color = self.rng.wheel_away_from(self.aux_color);
            }
        }
        delay
    }

    fn running<S: PixelSink>(&mut self, sink: &mut S, c1: u32, c2: u32) -> u32 {
        for i in 0..self.len {
            let color = if (u32::from(i) + self.step) % 4 < 2 { c1 } else { c2 };
            let idx = if self.reverse { i } else { self.len - 1 - i };
            self.set(sink, idx, color);
        }
        self.step = (self.step + 1) & 0x3;
        self.speed / self.len32()
    }

    fn fire_flicker<S: PixelSink>(&mut self, sink: &mut S, rev_intensity: u8) -> u32 {
        let c = self.colors[0];
        let w = (c >> 24) as u8;
        let r = (c >> 16) as u8;
        let g = (c >> 8) as u8;
        let b = c as u8;
        let lum = w.max(r).max(g).max(b) / rev_intensity;
        for i in 0..self.len {
            let flicker = self.rng.below(lum);
            self.set_rgb(
                sink,
                i,
                r.saturating_sub(flicker),
                g.saturating_sub(flicker),
                b.saturating_sub(flicker),
            );
        }
        self.speed / self.len32()
    }

    fn tricolor_chase<S: PixelSink>(&mut self, sink: &mut S, c1: u32, c2: u32, c3: u32) -> u32 {
        let mut index = (self.step % 6) as u8;
        for i in 0..self.len {
            if index > 5 {
                index = 0;
            }
            let color = if index < 2 {
                c1
            } else if index < 4 {
                c2
            } else {
                c3
            };
            let idx = if self.reverse { i } else { self.len - 1 - i };
            self.set(sink, idx, color);
            index += 1;
        }

        self.step = self.step.wrapping_add(1);
        self.speed / self.len32()
    }

    fn icu<S: PixelSink>(&mut self, sink: &mut S) -> u32 {
        let half = self.len / 2;
        let mut dest = self.step as u16;

        self.set(sink, dest, self.colors[0]);
        self.set(sink, dest.saturating_add(half), self.colors[0]);

        if self.aux_index == dest {
            // Pause between eye movements, with an occasional blink.
            if self.rng.below(6) == 0 {
                self.set(sink, dest, BLACK);
                self.set(sink, dest.saturating_add(half), BLACK);
                return 200;
            }
            self.aux_index = self.rng.index(half);
            return 1000 + u32::from(self.rng.index(2000));
        }

        self.set(sink, dest, BLACK);
        self.set(sink, dest.saturating_add(half), BLACK);

        if self.aux_index > dest {
            self.step += 1;
            dest += 1;
        } else if self.aux_index < dest {
            self.step -= 1;
            dest -= 1;
        }

        self.set(sink, dest, self.colors[0]);
        self.set(sink, dest.saturating_add(half), self.colors[0]);

        self.speed / self.len32()
    }
}

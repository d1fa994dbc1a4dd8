//! Synthetic per-minute descriptor streams.
//!
//! A [`MinuteFixture`] produces plausible audio and light descriptors from a
//! seeded RNG, so a given seed always yields the same stream. Spikes push
//! the sound level or the modulation depth up for a window of minutes to
//! exercise the compliance flags.

use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, SecondsFormat, Utc};
use avsafe_ledger_core::{
    make_record, make_signed_record, HashAlg, Object, Record, Signer, Value,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Nominal third-octave centres, 100 Hz to 5 kHz.
const THIRD_OCTAVE_CENTRES: [f64; 18] = [
    100.0, 125.0, 160.0, 200.0, 250.0, 315.0, 400.0, 500.0, 630.0, 800.0, 1000.0, 1250.0,
    1600.0, 2000.0, 2500.0, 3150.0, 4000.0, 5000.0,
];

/// A window of minutes with an added offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spike {
    pub start: usize,
    pub duration: usize,
    pub delta: f64,
}

impl Spike {
    pub fn new(start: usize, duration: usize, delta: f64) -> Self {
        Self {
            start,
            duration,
            delta,
        }
    }

    fn offset(&self, idx: usize) -> f64 {
        if idx >= self.start && idx < self.start + self.duration {
            self.delta
        } else {
            0.0
        }
    }
}

/// Parses `t=<start>,dur=<minutes>,delta=<value>`. Missing keys default to
/// `t=0`, `dur=1`, `delta=6`.
impl FromStr for Spike {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let mut spike = Spike::new(0, 1, 6.0);
        for pair in s.split(',').filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("spike entry {:?} is not key=value", pair))?;
            let value = value.trim();
            match key.trim() {
                "t" => spike.start = value.parse().context("spike start")?,
                "dur" => spike.duration = value.parse().context("spike duration")?,
                "delta" => spike.delta = value.parse().context("spike delta")?,
                other => bail!("unknown spike key {:?}", other),
            }
        }
        if spike.duration == 0 {
            bail!("spike duration must be positive");
        }
        Ok(spike)
    }
}

/// Generator for a device's minute descriptors.
#[derive(Debug, Clone)]
pub struct MinuteFixture {
    pub device_id: String,
    pub schema: String,
    /// Unix seconds of minute 0.
    pub start_unix: i64,
    pub laeq_base: f64,
    pub laeq_sigma: f64,
    /// Uniform dB added to LAeq for LCpeak.
    pub lcpeak_extra: (f64, f64),
    pub tlm_freqs: Vec<f64>,
    pub tlm_mod_base: f64,
    pub tlm_mod_sigma: f64,
    pub flicker_index: (f64, f64),
    pub audio_spike: Option<Spike>,
    pub flicker_spike: Option<Spike>,
    rng: StdRng,
    next_idx: usize,
}

impl MinuteFixture {
    /// Quiet, low-flicker defaults. 2025-01-01T00:00:00Z is minute 0.
    pub fn new(seed: u64) -> Self {
        Self {
            device_id: "dev-1".to_owned(),
            schema: "avsafe.v1".to_owned(),
            start_unix: 1_735_689_600,
            laeq_base: 52.0,
            laeq_sigma: 4.0,
            lcpeak_extra: (5.0, 15.0),
            tlm_freqs: vec![100.0, 120.0, 180.0, 300.0, 1000.0],
            tlm_mod_base: 2.0,
            tlm_mod_sigma: 1.0,
            flicker_index: (0.0, 0.2),
            audio_spike: None,
            flicker_spike: None,
            rng: StdRng::seed_from_u64(seed),
            next_idx: 0,
        }
    }

    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn audio_spike(mut self, spike: Spike) -> Self {
        self.audio_spike = Some(spike);
        self
    }

    pub fn flicker_spike(mut self, spike: Spike) -> Self {
        self.flicker_spike = Some(spike);
        self
    }

    /// The next minute's payload.
    pub fn next_minute(&mut self) -> Object {
        let idx = self.next_idx;
        self.next_idx += 1;

        let mut laeq = gauss(&mut self.rng, self.laeq_base, self.laeq_sigma);
        if let Some(spike) = &self.audio_spike {
            laeq += spike.offset(idx);
        }
        let lcpeak = laeq + self.rng.gen_range(self.lcpeak_extra.0..=self.lcpeak_extra.1);
        let bands = self.third_octaves(laeq);

        let tlm_freq = if self.tlm_freqs.is_empty() {
            100.0
        } else {
            self.tlm_freqs[self.rng.gen_range(0..self.tlm_freqs.len())]
        };
        let mut tlm_mod = gauss(&mut self.rng, self.tlm_mod_base, self.tlm_mod_sigma).max(0.0);
        if let Some(spike) = &self.flicker_spike {
            tlm_mod += spike.offset(idx);
        }
        let flicker_index = self.rng.gen_range(self.flicker_index.0..=self.flicker_index.1);

        let mut audio = Object::new();
        audio.insert("laeq_db".into(), round_to(laeq, 1).into());
        audio.insert("lcpeak_db".into(), round_to(lcpeak, 1).into());
        audio.insert("third_octave_db".into(), Value::Object(bands));

        let mut light = Object::new();
        light.insert("tlm_freq_hz".into(), tlm_freq.into());
        light.insert("tlm_mod_percent".into(), round_to(tlm_mod, 2).into());
        light.insert("flicker_index".into(), round_to(flicker_index, 3).into());

        let mut payload = Object::new();
        payload.insert("schema".into(), self.schema.as_str().into());
        payload.insert("idx".into(), idx.into());
        let ts = utc_iso(self.start_unix + 60 * idx as i64);
        payload.insert("ts".into(), ts.map_or(Value::Null, Value::from));
        payload.insert("device_id".into(), self.device_id.as_str().into());
        payload.insert("audio".into(), Value::Object(audio));
        payload.insert("light".into(), Value::Object(light));
        payload
    }

    /// The next `n` payloads.
    pub fn minutes(&mut self, n: usize) -> Vec<Object> {
        (0..n).map(|_| self.next_minute()).collect()
    }

    /// `n` unsigned records chained from genesis.
    pub fn chain(&mut self, n: usize, alg: HashAlg) -> anyhow::Result<Vec<Record>> {
        let mut prev: Option<String> = None;
        let mut records = Vec::with_capacity(n);
        for payload in self.minutes(n) {
            let record = make_record(payload, prev.as_deref(), alg)?;
            prev = Some(record.hash().to_owned());
            records.push(record);
        }
        Ok(records)
    }

    /// `n` records signed with `signer` under a fixed device seed.
    pub fn signed_chain(
        &mut self,
        n: usize,
        signer: &Signer,
        seed: &[u8; 32],
    ) -> anyhow::Result<Vec<Record>> {
        let mut prev: Option<String> = None;
        let mut records = Vec::with_capacity(n);
        for payload in self.minutes(n) {
            let record =
                make_signed_record(payload, prev.as_deref(), HashAlg::Sha256, signer, Some(&seed[..]))?;
            prev = Some(record.hash().to_owned());
            records.push(record);
        }
        Ok(records)
    }

    /// A pinkish spectrum around `laeq`, falling 6 dB per octave above 1 kHz.
    fn third_octaves(&mut self, laeq: f64) -> Object {
        THIRD_OCTAVE_CENTRES
            .iter()
            .map(|fc| {
                let level = laeq - 6.0 * (fc / 1000.0).log2() + gauss(&mut self.rng, 0.0, 1.5);
                (format!("{}", *fc as u32), Value::Float(round_to(level, 1)))
            })
            .collect()
    }
}

/// Descriptor fixtures for several devices, one seed each.
pub fn device_fixtures(count: usize) -> Vec<MinuteFixture> {
    (0..count)
        .map(|i| MinuteFixture::new(i as u64).device(format!("dev-{}", i + 1)))
        .collect()
}

/// Normal sample by Box-Muller.
fn gauss(rng: &mut StdRng, mean: f64, sigma: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + sigma * z
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round() / scale
}

/// `YYYY-MM-DDTHH:MM:SSZ` for Unix seconds, `None` out of range.
fn utc_iso(unix: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(unix, 0).map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let a = MinuteFixture::new(42).minutes(5);
        let b = MinuteFixture::new(42).minutes(5);
        assert_eq!(a, b);
        assert_ne!(a, MinuteFixture::new(43).minutes(5));
    }

    #[test]
    fn test_timestamps_advance_by_minute() {
        let minutes = MinuteFixture::new(1).minutes(62);
        assert_eq!(minutes[0]["ts"], Value::from("2025-01-01T00:00:00Z"));
        assert_eq!(minutes[61]["ts"], Value::from("2025-01-01T01:01:00Z"));
        assert_eq!(utc_iso(951_782_400).as_deref(), Some("2000-02-29T00:00:00Z"));
        assert_eq!(utc_iso(-86_400).as_deref(), Some("1969-12-31T00:00:00Z"));
        assert_eq!(utc_iso(i64::MAX), None);
    }

    #[test]
    fn test_spike_window() {
        let spike: Spike = "t=10,dur=3,delta=8".parse().unwrap();
        assert_eq!(spike, Spike::new(10, 3, 8.0));
        assert_eq!(spike.offset(9), 0.0);
        assert_eq!(spike.offset(12), 8.0);
        assert_eq!(spike.offset(13), 0.0);
        assert!("t=1,dur=0".parse::<Spike>().is_err());
        assert!("when=3".parse::<Spike>().is_err());
    }

    #[test]
    fn test_chain_links() {
        let records = MinuteFixture::new(7).chain(4, HashAlg::Sha256).unwrap();
        assert_eq!(records[0].chain().prev, None);
        for pair in records.windows(2) {
            assert_eq!(pair[1].chain().prev.as_deref(), Some(pair[0].hash()));
        }
    }
}

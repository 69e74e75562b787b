//! Live context providers: time-of-day, weather, and music mood.
//!
//! Each provider degrades instead of failing: the clock cannot fail, the
//! weather fetch returns `None` on any network or parse problem, and the
//! audio sampler returns `None` when no input device is usable. Callers map
//! `None` to a default bucket or a random draw.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Timelike;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Sample, SampleFormat, Stream, StreamConfig};
use log::{debug, warn};
use rand::Rng;
use serde::Deserialize;

/// Weather endpoint returning a JSON report with the current condition text.
const WEATHER_URL: &str = "https://wttr.in/?format=j1";
/// Weather lookups are best-effort; keep the wait short.
const WEATHER_TIMEOUT: Duration = Duration::from_secs(5);
/// How long the audio sampler listens before classifying.
const AUDIO_WINDOW: Duration = Duration::from_millis(300);

/// One of the six fixed time-of-day bands. Total over all 24 hours.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimePeriod {
    Dawn,
    Morning,
    Afternoon,
    Evening,
    Night,
    Midnight,
}

impl TimePeriod {
    /// Classify a local hour (0..24) into its band.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=6 => TimePeriod::Dawn,
            7..=11 => TimePeriod::Morning,
            12..=16 => TimePeriod::Afternoon,
            17..=19 => TimePeriod::Evening,
            20..=22 => TimePeriod::Night,
            _ => TimePeriod::Midnight,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            TimePeriod::Dawn => "dawn",
            TimePeriod::Morning => "morning",
            TimePeriod::Afternoon => "afternoon",
            TimePeriod::Evening => "evening",
            TimePeriod::Night => "night",
            TimePeriod::Midnight => "midnight",
        }
    }
}

/// Current local hour, 0..24.
pub fn current_hour() -> u32 {
    chrono::Local::now().hour()
}

/// One of the six fixed weather buckets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WeatherBucket {
    Clear,
    Cloudy,
    Rain,
    Snow,
    Storm,
    Fog,
}

impl WeatherBucket {
    /// Bucket a free-form condition string by keyword. Unknown text and a
    /// missing report both land in the clear bucket, never an error.
    pub fn from_condition(condition: Option<&str>) -> Self {
        let Some(condition) = condition else {
            return WeatherBucket::Clear;
        };
        let text = condition.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

        if has(&["clear", "sunny"]) {
            WeatherBucket::Clear
        } else if has(&["rain", "drizzle", "shower"]) {
            WeatherBucket::Rain
        } else if has(&["snow", "sleet", "blizzard"]) {
            WeatherBucket::Snow
        } else if has(&["storm", "thunder", "lightning"]) {
            WeatherBucket::Storm
        } else if has(&["fog", "mist", "haze"]) {
            WeatherBucket::Fog
        } else if has(&["cloud", "overcast", "partly"]) {
            WeatherBucket::Cloudy
        } else {
            WeatherBucket::Clear
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            WeatherBucket::Clear => "clear",
            WeatherBucket::Cloudy => "cloudy",
            WeatherBucket::Rain => "rain",
            WeatherBucket::Snow => "snow",
            WeatherBucket::Storm => "storm",
            WeatherBucket::Fog => "fog",
        }
    }
}

#[derive(Debug, Deserialize)]
struct WttrReport {
    #[serde(default)]
    current_condition: Vec<WttrCondition>,
}

#[derive(Debug, Deserialize)]
struct WttrCondition {
    #[serde(rename = "weatherDesc", default)]
    weather_desc: Vec<WttrValue>,
}

#[derive(Debug, Deserialize)]
struct WttrValue {
    value: String,
}

/// Fetch the current weather condition text for the caller's IP location.
/// Any failure is logged and reported as `None`.
pub fn fetch_weather() -> Option<String> {
    match fetch_weather_from(WEATHER_URL) {
        Ok(condition) => {
            debug!("weather condition: {condition}");
            Some(condition)
        }
        Err(err) => {
            warn!("weather lookup failed: {err}");
            None
        }
    }
}

fn fetch_weather_from(url: &str) -> Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(WEATHER_TIMEOUT)
        .build()?;
    let report: WttrReport = client.get(url).send()?.error_for_status()?.json()?;
    report
        .current_condition
        .first()
        .and_then(|c| c.weather_desc.first())
        .map(|d| d.value.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("weather report has no condition text"))
}

/// One of the four fixed music moods.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MusicMood {
    Calm,
    Ambient,
    Energetic,
    Intense,
}

impl MusicMood {
    pub const ALL: [MusicMood; 4] = [
        MusicMood::Calm,
        MusicMood::Ambient,
        MusicMood::Energetic,
        MusicMood::Intense,
    ];

    /// Classify a normalized energy level (0.0..=1.0) into a mood.
    pub fn from_energy(energy: f32) -> Self {
        if energy < 0.2 {
            MusicMood::Calm
        } else if energy < 0.4 {
            MusicMood::Ambient
        } else if energy < 0.7 {
            MusicMood::Energetic
        } else {
            MusicMood::Intense
        }
    }

    /// Uniform fallback draw used when the audio provider is unavailable.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn key(&self) -> &'static str {
        match self {
            MusicMood::Calm => "calm",
            MusicMood::Ambient => "ambient",
            MusicMood::Energetic => "energetic",
            MusicMood::Intense => "intense",
        }
    }
}

/// Sample the default audio input briefly and classify its mood.
/// Returns `None` when no input device is usable.
pub fn sample_music_mood() -> Option<MusicMood> {
    match sample_energy() {
        Ok(energy) => {
            debug!("audio energy: {energy:.3}");
            Some(MusicMood::from_energy(energy))
        }
        Err(err) => {
            warn!("audio capture unavailable: {err}");
            None
        }
    }
}

/// Open the default input stream, listen for a short window, and compute a
/// normalized mean-amplitude energy.
fn sample_energy() -> Result<f32> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no audio input device available"))?;
    let config = device.default_input_config()?;

    let samples: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
    let stream = match config.sample_format() {
        SampleFormat::F32 => capture_stream::<f32>(&device, &config.into(), Arc::clone(&samples))?,
        SampleFormat::I16 => capture_stream::<i16>(&device, &config.into(), Arc::clone(&samples))?,
        SampleFormat::U16 => capture_stream::<u16>(&device, &config.into(), Arc::clone(&samples))?,
        SampleFormat::I32 => capture_stream::<i32>(&device, &config.into(), Arc::clone(&samples))?,
        other => return Err(anyhow!("unsupported sample format {other:?}")),
    };
    stream.play()?;
    thread::sleep(AUDIO_WINDOW);
    drop(stream);

    let samples = samples.lock().map_err(|_| anyhow!("sample buffer poisoned"))?;
    if samples.is_empty() {
        return Err(anyhow!("audio stream produced no samples"));
    }
    let mean_amplitude = samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32;
    Ok((mean_amplitude * 10.0).min(1.0))
}

fn capture_stream<T>(
    device: &Device,
    config: &StreamConfig,
    sink: Arc<Mutex<Vec<f32>>>,
) -> Result<Stream>
where
    T: Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if let Ok(mut sink) = sink.lock() {
                sink.extend(data.iter().map(|&s| f32::from_sample(s)));
            }
        },
        |err| warn!("audio stream error: {err}"),
        None,
    )?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    #[test]
    fn time_bands_are_total_over_the_day() {
        let mut seen = std::collections::HashSet::new();
        for hour in 0..24 {
            seen.insert(TimePeriod::from_hour(hour).key());
        }
        // All six bands appear and nothing else does.
        assert_eq!(seen.len(), 6);
        assert_eq!(TimePeriod::from_hour(5), TimePeriod::Dawn);
        assert_eq!(TimePeriod::from_hour(11), TimePeriod::Morning);
        assert_eq!(TimePeriod::from_hour(12), TimePeriod::Afternoon);
        assert_eq!(TimePeriod::from_hour(19), TimePeriod::Evening);
        assert_eq!(TimePeriod::from_hour(22), TimePeriod::Night);
        assert_eq!(TimePeriod::from_hour(23), TimePeriod::Midnight);
        assert_eq!(TimePeriod::from_hour(0), TimePeriod::Midnight);
    }

    #[test]
    fn weather_keywords_bucket_correctly() {
        let cases = [
            ("Sunny", WeatherBucket::Clear),
            ("Light drizzle", WeatherBucket::Rain),
            ("Patchy snow possible", WeatherBucket::Snow),
            ("Thundery outbreaks possible", WeatherBucket::Storm),
            ("partly cloudy with thunder", WeatherBucket::Storm),
            ("Mist", WeatherBucket::Fog),
            ("Overcast", WeatherBucket::Cloudy),
            ("Partly cloudy", WeatherBucket::Cloudy),
        ];
        for (text, expected) in cases {
            assert_eq!(
                WeatherBucket::from_condition(Some(text)),
                expected,
                "condition {text:?}"
            );
        }
    }

    #[test]
    fn unknown_or_missing_weather_defaults_to_clear() {
        assert_eq!(WeatherBucket::from_condition(None), WeatherBucket::Clear);
        assert_eq!(
            WeatherBucket::from_condition(Some("volcanic ash plume")),
            WeatherBucket::Clear
        );
    }

    #[test]
    fn energy_thresholds_match_moods() {
        assert_eq!(MusicMood::from_energy(0.0), MusicMood::Calm);
        assert_eq!(MusicMood::from_energy(0.19), MusicMood::Calm);
        assert_eq!(MusicMood::from_energy(0.2), MusicMood::Ambient);
        assert_eq!(MusicMood::from_energy(0.5), MusicMood::Energetic);
        assert_eq!(MusicMood::from_energy(0.7), MusicMood::Intense);
        assert_eq!(MusicMood::from_energy(1.0), MusicMood::Intense);
    }

    #[test]
    fn fallback_mood_is_roughly_uniform() {
        let mut rng = ChaChaRng::seed_from_u64(42);
        let mut counts = std::collections::HashMap::new();
        let trials = 4000;
        for _ in 0..trials {
            *counts.entry(MusicMood::random(&mut rng).key()).or_insert(0u32) += 1;
        }
        assert_eq!(counts.len(), 4);
        for (mood, count) in counts {
            // Expect ~1000 each; allow a generous band.
            assert!(
                (800..=1200).contains(&count),
                "mood {mood} drawn {count} times out of {trials}"
            );
        }
    }
}

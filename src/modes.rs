//! Generation modes, prompt tables and sub-condition resolution.
//!
//! Every mode maps to a fixed table of `(sub-condition, prompt)` pairs. The
//! deterministic modes (time, weather, music) pick their entry from live
//! context, the category modes draw uniformly at random, and the custom mode
//! bypasses the tables entirely.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::context::{MusicMood, TimePeriod, WeatherBucket};

/// Top-level wallpaper-generation category selected by the user.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    TimeOfDay,
    Weather,
    Music,
    Aesthetic,
    Nature,
    Space,
    Abstract,
    Cyberpunk,
    Fantasy,
    Custom,
}

impl Mode {
    pub const ALL: [Mode; 10] = [
        Mode::TimeOfDay,
        Mode::Weather,
        Mode::Music,
        Mode::Aesthetic,
        Mode::Nature,
        Mode::Space,
        Mode::Abstract,
        Mode::Cyberpunk,
        Mode::Fantasy,
        Mode::Custom,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Mode::TimeOfDay => "Time of Day",
            Mode::Weather => "Weather Reactive",
            Mode::Music => "Music Reactive",
            Mode::Aesthetic => "Aesthetic Vibe",
            Mode::Nature => "Nature Focus",
            Mode::Space => "Space & Cosmos",
            Mode::Abstract => "Abstract Art",
            Mode::Cyberpunk => "Cyberpunk",
            Mode::Fantasy => "Fantasy World",
            Mode::Custom => "Custom Prompt",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Mode::TimeOfDay => "Wallpapers matching your local time and sun position.",
            Mode::Weather => "Reacts to your local weather: sunny, rainy, or stormy visuals.",
            Mode::Music => "Visualizes the music you are playing into abstract art.",
            Mode::Aesthetic => "Vaporwave, synthwave, and modern aesthetic art styles.",
            Mode::Nature => "Serene landscapes, forests, and natural wonders.",
            Mode::Space => "Cosmic scenes, nebulas, and the deep universe.",
            Mode::Abstract => "Digital patterns, shapes, and abstract compositions.",
            Mode::Cyberpunk => "Neon-lit futuristic cityscapes and high-tech dystopias.",
            Mode::Fantasy => "Magical worlds, mythical creatures, and epic scenes.",
            Mode::Custom => "Your creative vision. Type anything.",
        }
    }
}

/// A resolved sub-condition and the prompt it selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub sub_condition: String,
    pub prompt: String,
}

/// Live context sampled once per generation cycle. `None` values mean the
/// provider was unavailable; resolution falls back rather than failing.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    /// Local hour of day, 0..24.
    pub hour: u32,
    /// Raw weather condition text, if the weather service responded.
    pub weather: Option<String>,
    /// Classified music mood, if the audio subsystem was available.
    pub mood: Option<MusicMood>,
}

const TIME_PROMPTS: [(&str, &str); 6] = [
    ("dawn", "Beautiful serene dawn landscape, soft pink and orange sky, peaceful morning atmosphere, cinematic, 8k, photorealistic"),
    ("morning", "Bright cheerful morning scene, clear blue sky, vibrant colors, energetic atmosphere, beautiful sunlight, 8k, photorealistic"),
    ("afternoon", "Warm afternoon landscape, golden sunlight, peaceful scene, clear skies, vibrant nature, 8k, photorealistic"),
    ("evening", "Stunning sunset scene, golden hour lighting, warm orange and purple sky, peaceful atmosphere, 8k, photorealistic"),
    ("night", "Beautiful night sky with stars, moonlight, serene nocturnal landscape, deep blues and purples, 8k, photorealistic"),
    ("midnight", "Mystical midnight scene, starry sky, moonlit landscape, dreamy atmosphere, dark blues and silvers, 8k, photorealistic"),
];

const WEATHER_PROMPTS: [(&str, &str); 6] = [
    ("clear", "Crystal clear sky, beautiful sunny day, vibrant landscape, perfect weather, 8k, photorealistic"),
    ("cloudy", "Dramatic cloudy sky, moody atmosphere, beautiful cloud formations, scenic landscape, 8k, photorealistic"),
    ("rain", "Rainy day atmosphere, water droplets, moody sky, cozy rainy scene, beautiful reflections, 8k, photorealistic"),
    ("snow", "Beautiful snowy landscape, winter wonderland, pristine white snow, peaceful winter scene, 8k, photorealistic"),
    ("storm", "Dramatic storm clouds, powerful weather, lightning in distance, epic atmospheric scene, 8k, photorealistic"),
    ("fog", "Mysterious foggy landscape, ethereal atmosphere, soft diffused light, dreamy scene, 8k, photorealistic"),
];

const MUSIC_PROMPTS: [(&str, &str); 4] = [
    ("calm", "Peaceful serene abstract patterns, soft pastel colors, flowing shapes, meditative atmosphere, zen-like, 8k, digital art"),
    ("ambient", "Ethereal ambient visual patterns, soft glowing colors, dreamy atmosphere, flowing organic forms, mystical, 8k, digital art"),
    ("energetic", "Dynamic energetic abstract art, vibrant neon colors, motion blur, exciting patterns, high energy visualization, 8k, digital art"),
    ("intense", "Intense dramatic abstract visualization, bold contrasting colors, sharp geometric patterns, powerful energy, explosive, 8k, digital art"),
];

const AESTHETIC_PROMPTS: [(&str, &str); 5] = [
    ("vaporwave", "Vaporwave aesthetic, retro 80s vibes, pink and cyan colors, palm trees, geometric shapes, nostalgic, 8k"),
    ("minimalist", "Minimalist landscape, simple clean design, limited color palette, peaceful composition, modern aesthetic, 8k"),
    ("cottagecore", "Cozy cottagecore aesthetic, wildflowers, rustic cottage, warm sunlight, peaceful countryside, vintage feel, 8k"),
    ("dark_academia", "Dark academia aesthetic, vintage library, moody atmosphere, warm candlelight, books and knowledge, classical, 8k"),
    ("synthwave", "Synthwave aesthetic, neon sunset, retro futuristic, grid patterns, purple and pink gradient, 80s vibes, 8k"),
];

const NATURE_PROMPTS: [(&str, &str); 5] = [
    ("forest", "Mystical forest scene, sunbeams through trees, lush greenery, peaceful woodland path, magical atmosphere, 8k, photorealistic"),
    ("ocean", "Serene ocean view, crystal clear waters, tropical beach, gentle waves, paradise setting, stunning colors, 8k, photorealistic"),
    ("mountains", "Majestic mountain landscape, dramatic peaks, alpine scenery, pristine wilderness, breathtaking vista, 8k, photorealistic"),
    ("desert", "Beautiful desert landscape, sand dunes, warm golden light, vast open space, dramatic sky, 8k, photorealistic"),
    ("aurora", "Northern lights display, dancing aurora borealis, starry night sky, magical atmosphere, vivid colors, 8k, photorealistic"),
];

const SPACE_PROMPTS: [(&str, &str); 5] = [
    ("nebula", "Colorful space nebula, cosmic clouds, stars and galaxies, vibrant colors, deep space photography, 8k"),
    ("planets", "Alien planet landscape, multiple moons in sky, sci-fi scenery, otherworldly atmosphere, cinematic, 8k"),
    ("galaxy", "Spiral galaxy, millions of stars, cosmic beauty, deep space view, astronomical wonder, 8k"),
    ("blackhole", "Black hole visualization, event horizon, gravitational lensing, cosmic phenomenon, scientific beauty, 8k"),
    ("stars", "Starfield panorama, milky way galaxy, countless stars, cosmic perspective, night sky magnificence, 8k"),
];

const ABSTRACT_PROMPTS: [(&str, &str); 5] = [
    ("fluid", "Fluid art, flowing colors, marble texture, organic patterns, liquid dynamics, vibrant swirls, ultra detailed, sharp focus, 8k uhd, digital art masterpiece"),
    ("geometric", "Geometric abstract art, sharp angles, bold shapes, modern design, colorful composition, ultra detailed, sharp focus, 8k uhd, digital art, award winning"),
    ("fractal", "Fractal patterns, mathematical beauty, infinite detail, psychedelic colors, mesmerizing design, ultra detailed, sharp focus, 8k uhd, digital art masterpiece"),
    ("watercolor", "Abstract watercolor art, soft blending, dreamy colors, artistic expression, flowing paint, ultra detailed, sharp focus, 8k uhd, digital art, professional"),
    ("glitch", "Glitch art aesthetic, digital corruption, vibrant color distortion, cybernetic patterns, modern digital art, ultra detailed, sharp focus, 8k uhd, masterpiece"),
];

const CYBERPUNK_PROMPTS: [(&str, &str); 3] = [
    ("city", "Cyberpunk city night, neon lights, rain-soaked streets, futuristic buildings, blade runner atmosphere, 8k, cinematic"),
    ("tech", "Cyberpunk technology, holographic interfaces, neon circuitry, futuristic tech, sci-fi aesthetic, 8k, digital art"),
    ("dark", "Dark cyberpunk alley, moody atmosphere, neon signs, urban dystopia, gritty futuristic, 8k, cinematic"),
];

const FANTASY_PROMPTS: [(&str, &str); 4] = [
    ("castle", "Fantasy castle, magical kingdom, dramatic clouds, enchanted atmosphere, epic fantasy landscape, 8k, digital art"),
    ("dragon", "Majestic dragon flying, epic fantasy scene, magical atmosphere, dramatic lighting, mythical creature, 8k, digital art"),
    ("enchanted", "Enchanted forest, magical glowing plants, fairy lights, mystical atmosphere, fantasy wonderland, 8k, digital art"),
    ("portal", "Magical portal, swirling energy, fantasy gateway, mystical doorway, otherworldly magic, 8k, digital art"),
];

/// Placeholder prompts shown for the custom mode and used when the user
/// generates with an empty prompt box.
pub const PROMPT_EXAMPLES: [&str; 8] = [
    "ethereal forest at sunset with floating bioluminescent spores",
    "cyberpunk street market in the rain with neon reflections",
    "minimalist geometric abstract art with gold and marble textures",
    "majestic nebula with swirling cosmic dust and distant stars",
    "vaporwave sunset with palm trees and retro grid horizon",
    "hyper-realistic mountain landscape with clear turquoise lake",
    "fantasy castle floating among the clouds at dawn",
    "macro photography of a mechanical butterfly with clockwork wings",
];

/// Resolve the sub-condition and prompt for a mode.
///
/// Deterministic modes read the context snapshot, category modes draw from
/// their table, and the custom mode passes the user text through. This never
/// fails: unavailable context degrades to a default bucket or a random draw.
pub fn resolve(
    mode: Mode,
    custom_prompt: &str,
    ctx: &ContextSnapshot,
    rng: &mut impl Rng,
) -> Resolved {
    match mode {
        Mode::TimeOfDay => {
            let period = TimePeriod::from_hour(ctx.hour);
            lookup(&TIME_PROMPTS, period.key())
        }
        Mode::Weather => {
            let bucket = WeatherBucket::from_condition(ctx.weather.as_deref());
            lookup(&WEATHER_PROMPTS, bucket.key())
        }
        Mode::Music => {
            // A missing audio provider picks a random mood rather than
            // failing the whole generation.
            let mood = ctx.mood.unwrap_or_else(|| MusicMood::random(rng));
            lookup(&MUSIC_PROMPTS, mood.key())
        }
        Mode::Aesthetic => pick(&AESTHETIC_PROMPTS, rng),
        Mode::Nature => pick(&NATURE_PROMPTS, rng),
        Mode::Space => pick(&SPACE_PROMPTS, rng),
        Mode::Abstract => pick(&ABSTRACT_PROMPTS, rng),
        Mode::Cyberpunk => pick(&CYBERPUNK_PROMPTS, rng),
        Mode::Fantasy => pick(&FANTASY_PROMPTS, rng),
        Mode::Custom => {
            let text = custom_prompt.trim();
            let prompt = if text.is_empty() {
                PROMPT_EXAMPLES
                    .choose(rng)
                    .copied()
                    .unwrap_or(PROMPT_EXAMPLES[0])
                    .to_string()
            } else {
                text.to_string()
            };
            Resolved {
                sub_condition: "custom".to_string(),
                prompt,
            }
        }
    }
}

/// Look up a prompt by sub-condition key. Tables are fixed, so a miss can
/// only happen through a programming error; the first entry is the fallback.
fn lookup(table: &[(&str, &str)], key: &str) -> Resolved {
    let (sub, prompt) = table
        .iter()
        .find(|(k, _)| *k == key)
        .copied()
        .unwrap_or(table[0]);
    Resolved {
        sub_condition: sub.to_string(),
        prompt: prompt.to_string(),
    }
}

/// Uniform draw from a mode's table; repeats across calls are allowed.
fn pick(table: &[(&str, &str)], rng: &mut impl Rng) -> Resolved {
    let (sub, prompt) = table.choose(rng).copied().unwrap_or(table[0]);
    Resolved {
        sub_condition: sub.to_string(),
        prompt: prompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    fn rng() -> ChaChaRng {
        ChaChaRng::seed_from_u64(7)
    }

    #[test]
    fn every_hour_maps_to_a_time_prompt() {
        let keys: Vec<&str> = TIME_PROMPTS.iter().map(|(k, _)| *k).collect();
        for hour in 0..24 {
            let ctx = ContextSnapshot {
                hour,
                ..Default::default()
            };
            let resolved = resolve(Mode::TimeOfDay, "", &ctx, &mut rng());
            assert!(
                keys.contains(&resolved.sub_condition.as_str()),
                "hour {hour} resolved to unknown band {}",
                resolved.sub_condition
            );
        }
    }

    #[test]
    fn weather_defaults_to_clear_without_context() {
        let resolved = resolve(Mode::Weather, "", &ContextSnapshot::default(), &mut rng());
        assert_eq!(resolved.sub_condition, "clear");
    }

    #[test]
    fn thunder_resolves_to_storm_bucket() {
        let ctx = ContextSnapshot {
            weather: Some("partly cloudy with thunder".to_string()),
            ..Default::default()
        };
        let resolved = resolve(Mode::Weather, "", &ctx, &mut rng());
        assert_eq!(resolved.sub_condition, "storm");
    }

    #[test]
    fn music_without_provider_uses_a_known_mood() {
        let keys: Vec<&str> = MUSIC_PROMPTS.iter().map(|(k, _)| *k).collect();
        let mut rng = rng();
        for _ in 0..50 {
            let resolved = resolve(Mode::Music, "", &ContextSnapshot::default(), &mut rng);
            assert!(keys.contains(&resolved.sub_condition.as_str()));
        }
    }

    #[test]
    fn category_draws_stay_inside_their_table() {
        let keys: Vec<&str> = NATURE_PROMPTS.iter().map(|(k, _)| *k).collect();
        let mut rng = rng();
        for _ in 0..100 {
            let resolved = resolve(Mode::Nature, "", &ContextSnapshot::default(), &mut rng);
            assert!(keys.contains(&resolved.sub_condition.as_str()));
        }
    }

    #[test]
    fn custom_mode_passes_text_through() {
        let resolved = resolve(
            Mode::Custom,
            "  a koi pond under cherry blossoms  ",
            &ContextSnapshot::default(),
            &mut rng(),
        );
        assert_eq!(resolved.sub_condition, "custom");
        assert_eq!(resolved.prompt, "a koi pond under cherry blossoms");
    }

    #[test]
    fn empty_custom_prompt_falls_back_to_an_example() {
        let resolved = resolve(Mode::Custom, "   ", &ContextSnapshot::default(), &mut rng());
        assert!(PROMPT_EXAMPLES.contains(&resolved.prompt.as_str()));
    }

    #[test]
    fn mode_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Mode::TimeOfDay).unwrap(),
            r#""time_of_day""#
        );
        let mode: Mode = serde_json::from_str(r#""cyberpunk""#).unwrap();
        assert_eq!(mode, Mode::Cyberpunk);
    }
}

//! Motivational phrases shown in the menu header.

const PHRASES: [&str; 7] = [
    "Full focus, {name}. One more step today.",
    "Every minute counts, {name}. Let's go!",
    "Discipline is freedom, {name}. Keep going.",
    "You are closer than you think, {name}.",
    "Consistency is the key, {name}. Stay on track.",
    "Today is the day to make it happen, {name}!",
    "Your approval starts now, {name}.",
];

const DEFAULT_NAME: &str = "student";

/// Picks a phrase by `seed` and fills in the student's name.
///
/// The same seed always yields the same phrase, so callers pick how often it
/// changes (the app seeds with the day number).
pub fn pick_phrase(seed: u64, name: Option<&str>) -> String {
    let phrase = PHRASES[(seed % PHRASES.len() as u64) as usize];
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_NAME);
    phrase.replace("{name}", name)
}

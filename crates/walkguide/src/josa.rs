//! Korean postpositions (josa) for spoken messages.
//!
//! The correct particle depends on whether the word's last syllable ends in
//! a final consonant (batchim). Words that don't end in a Hangul syllable are
//! treated as vowel-final.

const HANGUL_BASE: u32 = 0xAC00;
const HANGUL_LAST: u32 = 0xD7A3;
const FINAL_CONSONANTS: u32 = 28;
// Final consonant index of ㄹ
const FINAL_RIEUL: u32 = 8;

/// Index of the final consonant of the word's last syllable, 0 if none.
fn final_consonant(word: &str) -> u32 {
    word.chars()
        .next_back()
        .map(u32::from)
        .filter(|code| (HANGUL_BASE..=HANGUL_LAST).contains(code))
        .map_or(0, |code| (code - HANGUL_BASE) % FINAL_CONSONANTS)
}

/// Append the direction marker 으로/로 to `word`.
///
/// 로 follows a vowel or ㄹ, 으로 any other final consonant. An empty word
/// yields an empty string.
#[must_use]
pub fn attach_direction(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let particle = match final_consonant(word) {
        0 | FINAL_RIEUL => "로",
        _ => "으로",
    };
    format!("{word}{particle}")
}

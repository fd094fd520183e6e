//! Contextual reshaping of Arabic script text: every letter is replaced by the presentation
//! form (isolated, final, initial or medial) that matches its neighbours, so that a renderer
//! without a shaping engine draws the letters joined.

use crate::error::ShapingError;

/// The reshaping policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReshaperConfiguration {
    /// Drop the combining diacritics (harakat) instead of keeping them next to their letter.
    pub delete_harakat: bool,
    /// Substitute the lam-alef ligatures.
    pub support_ligatures: bool,
    /// Substitute the word rial with the rial sign, only applies when ligatures are supported.
    pub rial_sign: bool,
}

impl ReshaperConfiguration {
    /// The policy used for Persian documents: diacritics are kept and every ligature is enabled.
    pub fn persian() -> ReshaperConfiguration {
        ReshaperConfiguration {
            delete_harakat: false,
            support_ligatures: true,
            rial_sign: true,
        }
    }
}

impl Default for ReshaperConfiguration {
    fn default() -> Self {
        ReshaperConfiguration {
            delete_harakat: true,
            support_ligatures: true,
            rial_sign: false,
        }
    }
}

const TATWEEL: char = '\u{0640}';
const ZERO_WIDTH_JOINER: char = '\u{200D}';
const LAM: char = '\u{0644}';
const RIAL_SIGN: char = '\u{FDFC}';

/// Presentation forms as `[isolated, final, initial, medial]`, zero where the form does not exist.
/// Letters without presentation forms map every form to themselves.
type Forms = [u32; 4];

const LETTERS: &[(char, Forms)] = &[
    ('\u{0621}', [0xFE80, 0, 0, 0]),
    ('\u{0622}', [0xFE81, 0xFE82, 0, 0]),
    ('\u{0623}', [0xFE83, 0xFE84, 0, 0]),
    ('\u{0624}', [0xFE85, 0xFE86, 0, 0]),
    ('\u{0625}', [0xFE87, 0xFE88, 0, 0]),
    ('\u{0626}', [0xFE89, 0xFE8A, 0xFE8B, 0xFE8C]),
    ('\u{0627}', [0xFE8D, 0xFE8E, 0, 0]),
    ('\u{0628}', [0xFE8F, 0xFE90, 0xFE91, 0xFE92]),
    ('\u{0629}', [0xFE93, 0xFE94, 0, 0]),
    ('\u{062A}', [0xFE95, 0xFE96, 0xFE97, 0xFE98]),
    ('\u{062B}', [0xFE99, 0xFE9A, 0xFE9B, 0xFE9C]),
    ('\u{062C}', [0xFE9D, 0xFE9E, 0xFE9F, 0xFEA0]),
    ('\u{062D}', [0xFEA1, 0xFEA2, 0xFEA3, 0xFEA4]),
    ('\u{062E}', [0xFEA5, 0xFEA6, 0xFEA7, 0xFEA8]),
    ('\u{062F}', [0xFEA9, 0xFEAA, 0, 0]),
    ('\u{0630}', [0xFEAB, 0xFEAC, 0, 0]),
    ('\u{0631}', [0xFEAD, 0xFEAE, 0, 0]),
    ('\u{0632}', [0xFEAF, 0xFEB0, 0, 0]),
    ('\u{0633}', [0xFEB1, 0xFEB2, 0xFEB3, 0xFEB4]),
    ('\u{0634}', [0xFEB5, 0xFEB6, 0xFEB7, 0xFEB8]),
    ('\u{0635}', [0xFEB9, 0xFEBA, 0xFEBB, 0xFEBC]),
    ('\u{0636}', [0xFEBD, 0xFEBE, 0xFEBF, 0xFEC0]),
    ('\u{0637}', [0xFEC1, 0xFEC2, 0xFEC3, 0xFEC4]),
    ('\u{0638}', [0xFEC5, 0xFEC6, 0xFEC7, 0xFEC8]),
    ('\u{0639}', [0xFEC9, 0xFECA, 0xFECB, 0xFECC]),
    ('\u{063A}', [0xFECD, 0xFECE, 0xFECF, 0xFED0]),
    ('\u{0641}', [0xFED1, 0xFED2, 0xFED3, 0xFED4]),
    ('\u{0642}', [0xFED5, 0xFED6, 0xFED7, 0xFED8]),
    ('\u{0643}', [0xFED9, 0xFEDA, 0xFEDB, 0xFEDC]),
    ('\u{0644}', [0xFEDD, 0xFEDE, 0xFEDF, 0xFEE0]),
    ('\u{0645}', [0xFEE1, 0xFEE2, 0xFEE3, 0xFEE4]),
    ('\u{0646}', [0xFEE5, 0xFEE6, 0xFEE7, 0xFEE8]),
    ('\u{0647}', [0xFEE9, 0xFEEA, 0xFEEB, 0xFEEC]),
    ('\u{0648}', [0xFEED, 0xFEEE, 0, 0]),
    ('\u{0649}', [0xFEEF, 0xFEF0, 0, 0]),
    ('\u{064A}', [0xFEF1, 0xFEF2, 0xFEF3, 0xFEF4]),
    ('\u{0671}', [0xFB50, 0xFB51, 0, 0]),
    ('\u{0679}', [0xFB66, 0xFB67, 0xFB68, 0xFB69]),
    ('\u{067A}', [0xFB5E, 0xFB5F, 0xFB60, 0xFB61]),
    ('\u{067B}', [0xFB52, 0xFB53, 0xFB54, 0xFB55]),
    ('\u{067E}', [0xFB56, 0xFB57, 0xFB58, 0xFB59]),
    ('\u{067F}', [0xFB62, 0xFB63, 0xFB64, 0xFB65]),
    ('\u{0680}', [0xFB5A, 0xFB5B, 0xFB5C, 0xFB5D]),
    ('\u{0681}', [0x0681, 0x0681, 0x0681, 0x0681]),
    ('\u{0683}', [0xFB76, 0xFB77, 0xFB78, 0xFB79]),
    ('\u{0684}', [0xFB72, 0xFB73, 0xFB74, 0xFB75]),
    ('\u{0686}', [0xFB7A, 0xFB7B, 0xFB7C, 0xFB7D]),
    ('\u{0687}', [0xFB7E, 0xFB7F, 0xFB80, 0xFB81]),
    ('\u{0688}', [0xFB88, 0xFB89, 0, 0]),
    ('\u{068C}', [0xFB84, 0xFB85, 0, 0]),
    ('\u{068D}', [0xFB82, 0xFB83, 0, 0]),
    ('\u{068E}', [0xFB86, 0xFB87, 0, 0]),
    ('\u{0691}', [0xFB8C, 0xFB8D, 0, 0]),
    ('\u{0698}', [0xFB8A, 0xFB8B, 0, 0]),
    ('\u{06A4}', [0xFB6A, 0xFB6B, 0xFB6C, 0xFB6D]),
    ('\u{06A6}', [0xFB6E, 0xFB6F, 0xFB70, 0xFB71]),
    ('\u{06A9}', [0xFB8E, 0xFB8F, 0xFB90, 0xFB91]),
    ('\u{06AD}', [0xFBD3, 0xFBD4, 0xFBD5, 0xFBD6]),
    ('\u{06AF}', [0xFB92, 0xFB93, 0xFB94, 0xFB95]),
    ('\u{06B1}', [0xFB9A, 0xFB9B, 0xFB9C, 0xFB9D]),
    ('\u{06B3}', [0xFB96, 0xFB97, 0xFB98, 0xFB99]),
    ('\u{06BA}', [0xFB9E, 0xFB9F, 0, 0]),
    ('\u{06BB}', [0xFBA0, 0xFBA1, 0xFBA2, 0xFBA3]),
    ('\u{06BE}', [0xFBAA, 0xFBAB, 0xFBAC, 0xFBAD]),
    ('\u{06C0}', [0xFBA4, 0xFBA5, 0, 0]),
    ('\u{06C1}', [0xFBA6, 0xFBA7, 0xFBA8, 0xFBA9]),
    ('\u{06C5}', [0xFBE0, 0xFBE1, 0, 0]),
    ('\u{06C6}', [0xFBD9, 0xFBDA, 0, 0]),
    ('\u{06C7}', [0xFBD7, 0xFBD8, 0, 0]),
    ('\u{06C8}', [0xFBDB, 0xFBDC, 0, 0]),
    ('\u{06C9}', [0xFBE2, 0xFBE3, 0, 0]),
    ('\u{06CB}', [0xFBDE, 0xFBDF, 0, 0]),
    ('\u{06CC}', [0xFBFC, 0xFBFD, 0xFBFE, 0xFBFF]),
    ('\u{06D0}', [0xFBE4, 0xFBE5, 0xFBE6, 0xFBE7]),
    ('\u{06D2}', [0xFBAE, 0xFBAF, 0, 0]),
    ('\u{06D3}', [0xFBB0, 0xFBB1, 0, 0]),
];

/// Lam followed by one of these alefs becomes a single right-joining ligature.
const LAM_ALEF_LIGATURES: &[(char, Forms)] = &[
    ('\u{0622}', [0xFEF5, 0xFEF6, 0, 0]),
    ('\u{0623}', [0xFEF7, 0xFEF8, 0, 0]),
    ('\u{0625}', [0xFEF9, 0xFEFA, 0, 0]),
    ('\u{0627}', [0xFEFB, 0xFEFC, 0, 0]),
];

/// The word rial, spelled with either the Persian or the Arabic yeh.
const RIAL_SPELLINGS: &[[char; 4]] = &[
    ['\u{0631}', '\u{06CC}', '\u{0627}', '\u{0644}'],
    ['\u{0631}', '\u{064A}', '\u{0627}', '\u{0644}'],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joining {
    Dual,
    Right,
    Causing,
    Transparent,
    NonJoining,
}

impl Joining {
    fn connects_backward(self) -> bool {
        matches!(self, Joining::Dual | Joining::Right | Joining::Causing)
    }

    fn connects_forward(self) -> bool {
        matches!(self, Joining::Dual | Joining::Causing)
    }
}

#[derive(Debug, Clone, Copy)]
enum Unit {
    Letter(Forms),
    Other(char),
}

impl Unit {
    fn joining(&self) -> Joining {
        match self {
            Unit::Letter([_, 0, _, _]) => Joining::NonJoining,
            Unit::Letter([_, _, 0, _]) => Joining::Right,
            Unit::Letter(_) => Joining::Dual,
            Unit::Other(character) if is_harakah(*character) => Joining::Transparent,
            Unit::Other(TATWEEL | ZERO_WIDTH_JOINER) => Joining::Causing,
            Unit::Other(_) => Joining::NonJoining,
        }
    }
}

pub fn is_harakah(character: char) -> bool {
    matches!(character,
        '\u{0610}'..='\u{061A}' | '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{06D6}'..='\u{06ED}')
}

fn letter_forms(character: char) -> Option<Forms> {
    LETTERS
        .iter()
        .find(|(letter, _)| *letter == character)
        .map(|(_, forms)| *forms)
}

/// Reshapes the text according to the given configuration. Text without Arabic script letters
/// comes out unchanged, control characters included. Kept harakat must follow a letter (the
/// tatweel included) which carries them.
pub fn reshape(text: &str, configuration: &ReshaperConfiguration) -> Result<String, ShapingError> {
    let characters: Vec<char> = text
        .chars()
        .filter(|character| !(configuration.delete_harakat && is_harakah(*character)))
        .collect();

    let mut carried = false;
    for (position, character) in characters.iter().enumerate() {
        if is_harakah(*character) {
            if !carried {
                return Err(ShapingError::DetachedHarakah {
                    character: *character,
                    position,
                });
            }
        } else {
            carried = character.is_alphabetic();
        }
    }

    let units = collect_units(&characters, configuration);

    let joinings: Vec<Joining> = units.iter().map(Unit::joining).collect();
    let mut reshaped_text = String::with_capacity(text.len());

    for (index, unit) in units.iter().enumerate() {
        let forms = match unit {
            Unit::Other(character) => {
                reshaped_text.push(*character);
                continue;
            }
            Unit::Letter(forms) => forms,
        };

        let previous = joinings[..index]
            .iter()
            .rev()
            .find(|joining| **joining != Joining::Transparent);
        let next = joinings[index + 1..]
            .iter()
            .find(|joining| **joining != Joining::Transparent);

        let joins_previous = joinings[index].connects_backward()
            && previous.is_some_and(|joining| joining.connects_forward());
        let joins_next = joinings[index].connects_forward()
            && next.is_some_and(|joining| joining.connects_backward());

        let form = match (joins_previous, joins_next) {
            (true, true) => forms[3],
            (true, false) => forms[1],
            (false, true) => forms[2],
            (false, false) => forms[0],
        };
        let form = if form == 0 { forms[0] } else { form };
        reshaped_text.push(char::from_u32(form).unwrap_or(char::REPLACEMENT_CHARACTER));
    }

    Ok(reshaped_text)
}

/// Splits the characters into shaping units, merging the ligatures enabled by the configuration.
fn collect_units(characters: &[char], configuration: &ReshaperConfiguration) -> Vec<Unit> {
    let mut units = Vec::with_capacity(characters.len());
    let mut index = 0;

    while index < characters.len() {
        let remaining = &characters[index..];

        if configuration.support_ligatures
            && configuration.rial_sign
            && RIAL_SPELLINGS
                .iter()
                .any(|spelling| remaining.starts_with(spelling))
        {
            units.push(Unit::Other(RIAL_SIGN));
            index += 4;
            continue;
        }

        if configuration.support_ligatures && remaining[0] == LAM {
            let ligature = remaining.get(1).and_then(|alef| {
                LAM_ALEF_LIGATURES
                    .iter()
                    .find(|(ligature_alef, _)| ligature_alef == alef)
            });
            if let Some((_, forms)) = ligature {
                units.push(Unit::Letter(*forms));
                index += 2;
                continue;
            }
        }

        units.push(match letter_forms(remaining[0]) {
            Some(forms) => Unit::Letter(forms),
            None => Unit::Other(remaining[0]),
        });
        index += 1;
    }

    units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_text_is_untouched() {
        let text = "Report 2024-01-31, page 1";

        assert_eq!(reshape(text, &ReshaperConfiguration::persian()).unwrap(), text);
    }

    #[test]
    fn letters_take_their_contextual_forms() {
        // Sin joins the lam-alef ligature, which cannot join the final mim.
        let reshaped = reshape("سلام", &ReshaperConfiguration::persian()).unwrap();

        assert_eq!(reshaped, "\u{FEB3}\u{FEFC}\u{FEE1}");
    }

    #[test]
    fn persian_letters_are_reshaped() {
        let reshaped = reshape("پیک", &ReshaperConfiguration::persian()).unwrap();

        assert_eq!(reshaped, "\u{FB58}\u{FBFF}\u{FB8F}");
    }

    #[test]
    fn rial_sign_depends_on_the_configuration() {
        assert_eq!(
            reshape("ریال", &ReshaperConfiguration::persian()).unwrap(),
            "\u{FDFC}"
        );
        assert_eq!(
            reshape("ریال", &ReshaperConfiguration::default()).unwrap(),
            "\u{FEAD}\u{FBFE}\u{FE8E}\u{FEDD}"
        );
    }

    #[test]
    fn harakat_are_transparent_or_deleted() {
        // Beh with fatha followed by teh: the fatha does not break the join.
        let kept = reshape("بَت", &ReshaperConfiguration::persian()).unwrap();
        assert_eq!(kept, "\u{FE91}\u{064E}\u{FE96}");

        let deleted = reshape("بَت", &ReshaperConfiguration::default()).unwrap();
        assert_eq!(deleted, "\u{FE91}\u{FE96}");
    }

    #[test]
    fn zero_width_non_joiner_breaks_the_join() {
        let reshaped = reshape("می\u{200C}خواهم", &ReshaperConfiguration::persian()).unwrap();

        assert!(reshaped.starts_with("\u{FEE3}\u{FBFD}\u{200C}\u{FEA7}"), "{:?}", reshaped);
    }

    #[test]
    fn control_characters_do_not_join() {
        let reshaped = reshape("سلام\u{000B}", &ReshaperConfiguration::persian()).unwrap();

        assert_eq!(reshaped, "\u{FEB3}\u{FEFC}\u{FEE1}\u{000B}");
        assert_eq!(
            reshape("نام\tنام\n", &ReshaperConfiguration::persian()).unwrap(),
            "\u{FEE7}\u{FE8E}\u{FEE1}\t\u{FEE7}\u{FE8E}\u{FEE1}\n"
        );
    }

    #[test]
    fn detached_harakat_cannot_be_kept() {
        let error = reshape("\u{064E}سلام", &ReshaperConfiguration::persian()).unwrap_err();
        assert_eq!(
            error,
            ShapingError::DetachedHarakah {
                character: '\u{064E}',
                position: 0
            }
        );
        assert!(reshape("ب \u{064E}", &ReshaperConfiguration::persian()).is_err());
        assert!(reshape("\u{0640}\u{064E}", &ReshaperConfiguration::persian()).is_ok());

        let deleted = reshape("\u{064E}سلام", &ReshaperConfiguration::default()).unwrap();
        assert_eq!(deleted, "\u{FEB3}\u{FEFC}\u{FEE1}");
    }

    #[test]
    fn letters_of_other_arabic_script_languages_are_reshaped() {
        // Heh with yeh above only joins the letter before it.
        assert_eq!(
            reshape("خانۀ", &ReshaperConfiguration::persian()).unwrap(),
            "\u{FEA7}\u{FE8E}\u{FEE7}\u{FBA5}"
        );
        assert_eq!(
            reshape("بھا", &ReshaperConfiguration::persian()).unwrap(),
            "\u{FE91}\u{FBAD}\u{FE8E}"
        );
        // Hah with hamza above has no presentation forms but still joins both sides.
        assert_eq!(
            reshape("بځب", &ReshaperConfiguration::persian()).unwrap(),
            "\u{FE91}\u{0681}\u{FE90}"
        );
        assert_eq!(
            reshape("ٹے", &ReshaperConfiguration::persian()).unwrap(),
            "\u{FB68}\u{FBAF}"
        );
    }
}

//! Cross-module checks over every built-in (mode, key) pair.

use sixstring_core::chords::{self, ChordMatch, StringMask};
use sixstring_core::error::ChordError;
use sixstring_core::modes::{ChordQuality, MODES};
use sixstring_core::notes::{PitchClass, frequency_of, nearest_note};
use sixstring_core::tuning::{TUNINGS, build_tuning};

#[test]
fn every_pair_has_six_ascending_strings() {
    for mode in MODES.iter() {
        for key in PitchClass::ALL {
            let tuned = build_tuning(key, mode).unwrap();
            let strings = &tuned.tuning.strings;
            assert_eq!(strings.len(), 6);

            for (string, &interval) in strings.iter().zip(mode.intervals()) {
                assert_eq!(string.pitch_class, key.transpose(interval as i32));
                assert_eq!(string.frequency, frequency_of(string.pitch_class, string.octave));
            }
            for pair in strings.windows(2) {
                assert!(pair[0].octave <= pair[1].octave, "{key} {}: {pair:?}", mode.name());
                assert!(pair[0].frequency < pair[1].frequency, "{key} {}: {pair:?}", mode.name());
            }
            assert!(
                strings[0].frequency >= frequency_of(PitchClass::Fs, 2)
                    && strings[0].frequency <= frequency_of(PitchClass::F, 3),
                "root string of {key} {} is {:?}",
                mode.name(),
                strings[0]
            );
        }
    }
}

#[test]
fn tuning_is_deterministic_and_cached() {
    assert_eq!(TUNINGS.len(), MODES.len() * 12);
    for mode in MODES.iter() {
        for key in PitchClass::ALL {
            let first = build_tuning(key, mode).unwrap();
            let second = build_tuning(key, mode).unwrap();
            assert_eq!(first, second);
            assert_eq!(*TUNINGS.get(mode.name(), key).unwrap(), first);
        }
    }
}

#[test]
fn tuned_strings_map_back_to_their_notes() {
    for tuned in MODES.iter().flat_map(|m| PitchClass::ALL.map(|k| TUNINGS.get(m.name(), k).unwrap())) {
        for string in &tuned.tuning.strings {
            let nearest = nearest_note(string.frequency).unwrap();
            assert_eq!(nearest.pitch_class, string.pitch_class);
            assert_eq!(nearest.octave, string.octave);
            assert!(nearest.cents.abs() < 1e-3);
        }
    }
}

#[test]
fn every_catalog_entry_matches_itself_first() {
    for mode in MODES.iter() {
        for key in PitchClass::ALL {
            let tuned = TUNINGS.get(mode.name(), key).unwrap();
            for (index, entry) in tuned.catalog.entries.iter().enumerate() {
                let found = chords::match_chord(&tuned.catalog, &StringMask::new(entry.pattern));
                match found {
                    Some(ChordMatch::Chord(chord)) => {
                        assert_eq!(chord.index, index);
                        assert_eq!(chord.name, entry.name);
                    }
                    other => panic!("{key} {}: {:?} matched {other:?}", mode.name(), entry.pattern),
                }
            }
        }
    }
}

#[test]
fn c_major_triad_shape() {
    let found = TUNINGS.match_chord("major", PitchClass::C, &[1, 0, 1, 0, 1, 0]).unwrap();
    let Some(ChordMatch::Chord(chord)) = found else {
        panic!("expected a chord");
    };
    assert_eq!(chord.name, "C");
    assert_eq!(chord.degree, "I");
    assert_eq!(chord.quality, ChordQuality::Major);
}

#[test]
fn same_shape_in_dorian_is_minor() {
    let found = TUNINGS.match_chord("dorian", PitchClass::C, &[1, 0, 1, 0, 1, 0]).unwrap();
    let Some(ChordMatch::Chord(chord)) = found else {
        panic!("expected a chord");
    };
    assert_eq!(chord.name, "Cm");
    assert_eq!(chord.degree, "i");
}

#[test]
fn names_follow_the_key() {
    let found = TUNINGS.match_chord("major", PitchClass::Fs, &[1, 0, 1, 0, 1, 0]).unwrap();
    assert!(matches!(found, Some(ChordMatch::Chord(ref c)) if c.name == "F#"));

    let found = TUNINGS.match_chord("minor", PitchClass::A, &[1, 0, 0, 1, 0, 1]).unwrap();
    assert!(matches!(found, Some(ChordMatch::Chord(ref c)) if c.name == "Dm"));
}

#[test]
fn muted_and_unknown_patterns() {
    for mode in MODES.iter() {
        let found = TUNINGS.match_chord(mode.name(), PitchClass::G, &[0; 6]).unwrap();
        assert_eq!(found, Some(ChordMatch::AllMuted));
    }
    let found = TUNINGS.match_chord("major", PitchClass::C, &[1; 6]).unwrap();
    assert_eq!(found, None);
}

#[test]
fn malformed_states_are_rejected() {
    assert_eq!(
        TUNINGS.match_chord("major", PitchClass::C, &[1, 0, 1]),
        Err(ChordError::InvalidLength { expected: 6, got: 3 })
    );
    assert_eq!(
        TUNINGS.match_chord("major", PitchClass::C, &[1, 0, 2, 0, 1, 0]),
        Err(ChordError::InvalidState { string: 2, value: 2 })
    );
    assert_eq!(
        TUNINGS.match_chord("lydian", PitchClass::C, &[1, 0, 1, 0, 1, 0]),
        Err(ChordError::UnknownMode("lydian".into()))
    );
}

#[test]
fn match_results_serialize_with_a_kind_tag() {
    let found = TUNINGS.match_chord("major", PitchClass::D, &[1, 0, 1, 0, 1, 0]).unwrap();
    let json = serde_json::to_value(&found).unwrap();
    assert_eq!(json["kind"], "chord");
    assert_eq!(json["name"], "D");
    assert_eq!(json["root"], "D");

    let json = serde_json::to_value(ChordMatch::AllMuted).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "all_muted" }));
}

//! End-to-end scenarios and properties for the `m.rx` engine.

use fts_rx::{advance, step, walk, Mode, MatchOptions, Pattern};

fn u16s(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn scenario_1_or_of_two_literals() {
    init_tracing();
    let pattern = Pattern::compile(&u16s("abc|def")).unwrap();
    let m = step(&pattern, &u16s("xdefy"), MatchOptions::default()).unwrap();
    assert_eq!((m.start, m.end), (1, 4));
}

#[test]
fn scenario_2_head_anchored_advance() {
    let pattern = Pattern::compile(&u16s("^hello")).unwrap();
    let m = advance(&pattern, &u16s("hello world"), MatchOptions::default()).unwrap();
    assert_eq!((m.start, m.end), (0, 5));
}

#[test]
fn scenario_3_plus_over_alternation_captures_full_span() {
    let pattern = Pattern::compile(&u16s("a(b|c)+d")).unwrap();
    let m = step(&pattern, &u16s("abcbd"), MatchOptions::default()).unwrap();
    assert_eq!((m.start, m.end), (0, 5));
    assert_eq!(m.groups[0], Some((1, 4)));
}

#[test]
fn scenario_4_group_then_backreference() {
    let check = Pattern::compile(&u16s(r"\(a\)\(b\)")).unwrap();
    assert_eq!(check.num_sub_patterns(), 1);

    let pattern = Pattern::compile(&u16s(r"\(ab\)\1")).unwrap();
    let m = step(&pattern, &u16s("abab"), MatchOptions::default()).unwrap();
    assert_eq!((m.start, m.end), (0, 4));
    assert_eq!(m.groups[0], Some((0, 2)));
}

#[test]
fn advance_agrees_with_step_at_start() {
    let pattern = Pattern::compile(&u16s("a+b")).unwrap();
    for text in ["ab", "aab", "xab", "b"] {
        let units = u16s(text);
        let adv = advance(&pattern, &units, MatchOptions::default());
        let st = step(&pattern, &units, MatchOptions::default());
        match (adv, st) {
            (Some(a), Some(s)) if s.start == 0 => assert_eq!(a.end, s.end),
            (None, Some(s)) => assert_ne!(s.start, 0),
            (None, None) => {}
            (Some(_), None) => panic!("advance succeeded but step failed"),
            (Some(_), Some(_)) => {}
        }
    }
}

#[test]
fn longest_end_is_at_least_shortest_end() {
    let pattern = Pattern::compile(&u16s("a+")).unwrap();
    let text = u16s("aaa");
    let longest = step(&pattern, &text, MatchOptions::builder().mode(Mode::Longest).build()).unwrap();
    let shortest = step(&pattern, &text, MatchOptions::builder().mode(Mode::Shortest).build()).unwrap();
    assert!(longest.end >= shortest.end);
}

#[test]
fn or_property_text_matching_one_branch_matches_whole() {
    let pattern = Pattern::compile(&u16s("cat|dog")).unwrap();
    assert!(step(&pattern, &u16s("I have a cat"), MatchOptions::default()).is_some());
    assert!(step(&pattern, &u16s("I have a dog"), MatchOptions::default()).is_some());
}

#[test]
fn andnot_property_matches_left_without_right() {
    let pattern = Pattern::compile(&u16s("cat-dog")).unwrap();
    assert!(step(&pattern, &u16s("cat alone"), MatchOptions::default()).is_some());
}

#[test]
fn and_property_requires_both_anywhere_in_text() {
    let pattern = Pattern::compile(&u16s("cat&dog")).unwrap();
    assert!(step(&pattern, &u16s("dog then cat"), MatchOptions::default()).is_some());
    assert!(step(&pattern, &u16s("only cat"), MatchOptions::default()).is_none());
}

#[test]
fn walk_returns_matches_in_nondecreasing_order() {
    let pattern = Pattern::compile(&u16s("a|ab")).unwrap();
    let matches = walk(&pattern, &u16s("ababab"), MatchOptions::default());
    for w in matches.windows(2) {
        assert!((w[0].start, w[0].end) <= (w[1].start, w[1].end));
    }
}

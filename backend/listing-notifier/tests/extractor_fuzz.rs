//! Property tests for diff extraction against arbitrary upstream formatting

mod common;

use common::{added_lines, posting};
use listing_notifier::services::extract_postings;
use proptest::prelude::*;

fn diff_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "\\+.{0,40}",
        " .{0,40}",
        "-.{0,40}",
        "\\+ *\\{",
        "\\+ *\\},?",
        "\\+ *\"[a-z_]{1,10}\": *(\"[^\"]{0,10}\"|[0-9]{1,5}|true|false),?",
        "@@ -[0-9]{1,3},[0-9] \\+[0-9]{1,3},[0-9] @@",
        Just(String::new()),
    ]
}

/// Lines that can sit between objects without opening a capture
fn noise_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "-.{0,30}",
        " .{0,30}",
        "\\+[a-z\\[\\],: ]{0,20}",
        "\\+ *\\},?",
        Just(" ]".to_string()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 500,
        ..ProptestConfig::default()
    })]

    /// Property: arbitrary line soup never panics and every result decoded fully
    #[test]
    fn arbitrary_lines_never_panic(lines in prop::collection::vec(diff_line(), 0..80)) {
        let postings = extract_postings(&lines);
        for p in postings {
            prop_assert!(serde_json::to_string(&p).is_ok());
        }
    }

    /// Property: well-formed postings separated by noise are all recovered, in order
    #[test]
    fn postings_survive_noise(
        titles in prop::collection::vec("[A-Za-z0-9{}\\[\\] ,]{1,30}", 1..6),
        noise in prop::collection::vec(prop::collection::vec(noise_line(), 0..4), 6),
    ) {
        let mut diff = Vec::new();
        let mut expected = Vec::new();
        for (i, title) in titles.iter().enumerate() {
            diff.extend(noise[i].iter().cloned());
            let p = posting(&format!("id-{i}"), title, &["Remote"]);
            diff.extend(added_lines(std::slice::from_ref(&p)));
            expected.push(p);
        }
        diff.extend(noise[titles.len()].iter().cloned());

        let extracted = extract_postings(&diff);
        prop_assert_eq!(extracted, expected);
    }
}

#[test]
fn test_one_good_one_missing_field_yields_one() {
    let good = posting("good", "Backend Engineer", &["Remote"]);
    let mut diff = added_lines(&[good.clone()]);

    let mut broken = added_lines(&[posting("bad", "No URL", &[])]);
    broken.retain(|l| !l.contains("\"url\""));
    diff.extend(broken);

    let extracted = extract_postings(&diff);
    assert_eq!(extracted, vec![good]);
}

#[test]
fn test_trailing_commas_from_array_context() {
    let lines = vec![
        "@@ -1,2 +1,14 @@",
        " [",
        "+  {",
        "+    \"id\": \"x\",",
        "+    \"title\": \"SWE\",",
        "+    \"company_name\": \"Co\",",
        "+    \"url\": \"https://co.example\",",
        "+    \"locations\": [\"Remote\",],",
        "+    \"sponsorship\": \"Other\",",
        "+    \"active\": true,",
        "+    \"source\": \"Simplify\",",
        "+    \"date_posted\": 1700000000,",
        "+  },",
        " ]",
    ];
    // A dangling comma in the middle of the object is not repaired
    assert!(extract_postings(&lines).is_empty());

    let mut repaired = lines.clone();
    repaired[7] = "+    \"locations\": [\"Remote\"],";
    let postings = extract_postings(&repaired);
    assert_eq!(postings.len(), 1);
    assert_eq!(postings[0].locations, vec!["Remote"]);
}

use std::cmp::Ordering;

/// A version split into its numeric release and an optional pre-release
/// qualifier (`beta`, `rc`, `pre`...) with the numbers that follow it.
#[derive(Debug, Default, PartialEq, Eq)]
struct ParsedVersion {
    release: Vec<u64>,
    qualifier: Option<(String, Vec<u64>)>,
}

/// Tokens split on separators and on digit/letter boundaries, so `pre1`
/// reads as `pre`, `1`.
fn tokens(raw: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for segment in raw.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut start = 0;
        let bytes = segment.as_bytes();
        for i in 1..bytes.len() {
            if bytes[i].is_ascii_digit() != bytes[i - 1].is_ascii_digit() {
                out.push(&segment[start..i]);
                start = i;
            }
        }
        if start < segment.len() {
            out.push(&segment[start..]);
        }
    }
    out
}

fn parse_version(raw: &str) -> ParsedVersion {
    let mut parsed = ParsedVersion::default();
    // Letters ahead of the first number (`b1.7.3`, `rd-132211`) are a prefix.
    let parts = tokens(raw);
    let mut rest = parts
        .iter()
        .skip_while(|t| !t.as_bytes()[0].is_ascii_digit());

    for token in rest.by_ref() {
        match token.parse::<u64>() {
            Ok(n) => parsed.release.push(n),
            Err(_) => {
                parsed.qualifier = Some((token.to_ascii_lowercase(), Vec::new()));
                break;
            }
        }
    }
    if let Some((_, numbers)) = parsed.qualifier.as_mut() {
        numbers.extend(rest.filter_map(|t| t.parse::<u64>().ok()));
    }
    parsed
}

fn qualifier_rank(qualifier: &str) -> u8 {
    match qualifier {
        "snapshot" | "w" => 0,
        "alpha" | "a" => 1,
        "beta" | "b" => 2,
        "pre" | "m" | "milestone" => 3,
        "rc" | "cr" => 4,
        _ => 5,
    }
}

fn compare_segments(a: &[u64], b: &[u64]) -> Ordering {
    let max_len = a.len().max(b.len());
    for idx in 0..max_len {
        let a_val = a.get(idx).copied().unwrap_or(0);
        let b_val = b.get(idx).copied().unwrap_or(0);
        match a_val.cmp(&b_val) {
            Ordering::Equal => continue,
            non_eq => return non_eq,
        }
    }
    Ordering::Equal
}

/// Numeric, segment-wise version ordering: `"3.10" > "3.9"`.
///
/// Missing trailing segments count as zero. With equal numbers a release
/// outranks any pre-release of it (`"9.5.0" > "9.5.0-beta"`), and
/// qualifiers order as `alpha < beta < pre < rc`. Anything still equal
/// falls back to a plain string comparison so the order stays total.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a_parsed = parse_version(a);
    let b_parsed = parse_version(b);

    compare_segments(&a_parsed.release, &b_parsed.release)
        .then_with(|| match (&a_parsed.qualifier, &b_parsed.qualifier) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some((a_name, a_nums)), Some((b_name, b_nums))) => qualifier_rank(a_name)
                .cmp(&qualifier_rank(b_name))
                .then_with(|| a_name.cmp(b_name))
                .then_with(|| compare_segments(a_nums, b_nums)),
        })
        .then_with(|| a.cmp(b))
}

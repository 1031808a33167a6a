//! `${var}` interpolation for tag values.

/// Substitute `${name}` references in `input` using `lookup`.
///
/// Returns the first unresolved variable name as the error. Text without
/// references passes through unchanged; an unterminated `${` is kept
/// verbatim.
pub(crate) fn interpolate(
    input: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = &after[..end];
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => return Err(name.to_string()),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn run(input: &str, pairs: &[(&str, &str)]) -> Result<String, String> {
        let map = vars(pairs);
        interpolate(input, &|name| map.get(name).cloned())
    }

    #[test]
    fn passthrough_without_references() {
        assert_eq!(run("plain text", &[]).unwrap(), "plain text");
    }

    #[test]
    fn substitutes_single_reference() {
        assert_eq!(
            run("Default: ${config_file}", &[("config_file", "/etc/config")]).unwrap(),
            "Default: /etc/config"
        );
    }

    #[test]
    fn substitutes_multiple_references() {
        assert_eq!(
            run("${a}-${b}", &[("a", "x"), ("b", "y")]).unwrap(),
            "x-y"
        );
    }

    #[test]
    fn unresolved_reference_reports_name() {
        assert_eq!(run("${missing}", &[]).unwrap_err(), "missing");
    }

    #[test]
    fn unterminated_reference_kept_verbatim() {
        assert_eq!(run("tail ${oops", &[]).unwrap(), "tail ${oops");
    }
}

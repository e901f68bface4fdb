/// Normalize `raw` into a POSIX-portable environment variable name.
///
/// The result is never empty, starts with `A-Z` or `_`, continues with
/// `A-Z`, `0-9` or `_`, and never contains two underscores in a row.
/// Leading and trailing underscores are trimmed unless the name would
/// otherwise start with a digit or be empty.
pub fn sanitize_name(raw: &str) -> String {
    let upper = raw.to_uppercase();

    let mut out = String::with_capacity(upper.len());
    for (i, c) in upper.chars().enumerate() {
        let keep = c.is_ascii_uppercase() || (i != 0 && c.is_ascii_digit());
        let c = if keep { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches('_');
    match trimmed.chars().next() {
        None => "_".to_string(),
        Some(first) if first.is_ascii_digit() => format!("_{trimmed}"),
        Some(_) => trimmed.to_string(),
    }
}

use std::path::PathBuf;

/// The separator used for every path stored in or requested from a box.
pub const PATH_BOX_SEP: char = '/';

#[cfg(windows)]
fn to_slash(input: &str) -> std::borrow::Cow<'_, str> {
    std::borrow::Cow::Owned(input.replace('\\', "/"))
}

#[cfg(not(windows))]
fn to_slash(input: &str) -> std::borrow::Cow<'_, str> {
    std::borrow::Cow::Borrowed(input)
}

/// Lexical normalisation of a slash separated path: collapses repeated
/// separators, drops `.` and resolves `..` against preceding components.
/// A rooted path never climbs above its root. An empty result becomes `.`.
pub fn normalize(input: &str) -> String {
    let rooted = input.starts_with(PATH_BOX_SEP);
    let mut out: Vec<&str> = vec![];

    for part in input.split(PATH_BOX_SEP) {
        match part {
            "" | "." => {}
            ".." => match out.last() {
                Some(&last) if last != ".." => {
                    out.pop();
                }
                _ if rooted => {}
                _ => out.push(".."),
            },
            part => out.push(part),
        }
    }

    let joined = out.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".into(),
        (false, false) => joined,
    }
}

/// Cleans a name the way every box lookup and every stored entry sees it:
/// one leading separator is stripped, platform separators become `/`,
/// and the rest is normalised lexically. No filesystem access happens.
pub fn clean_path(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let input = to_slash(input);
    let input = input.strip_prefix(PATH_BOX_SEP).unwrap_or(&input);
    normalize(input)
}

/// A physical location optionally exposed under a logical prefix, parsed from
/// `"<prefix>=<location>"`. Without a `=` the whole input is the location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Either empty or a cleaned prefix ending in `/`.
    pub prefix: String,
    pub location: PathBuf,
}

impl Mount {
    pub fn parse(input: &str) -> Mount {
        match input.split_once('=') {
            Some((prefix, location)) => {
                let prefix = clean_path(prefix);
                let prefix = match prefix.as_str() {
                    "" | "." => String::new(),
                    _ => format!("{}/", prefix),
                };
                Mount {
                    prefix,
                    location: PathBuf::from(location),
                }
            }
            None => Mount {
                prefix: String::new(),
                location: PathBuf::from(input),
            },
        }
    }

    pub fn has_prefix(&self) -> bool {
        !self.prefix.is_empty()
    }

    /// Maps a requested name onto the name stored inside the mount, or `None`
    /// if the request lies outside the prefix.
    pub fn strip(&self, name: &str) -> Option<String> {
        let cleaned = clean_path(name);
        if self.prefix.is_empty() {
            return Some(cleaned);
        }
        cleaned.strip_prefix(&self.prefix).map(str::to_string)
    }

    /// Maps a name stored inside the mount onto the name callers see.
    pub fn expose(&self, name: &str) -> String {
        clean_path(&format!("{}{}", self.prefix, name))
    }
}

//! Remote path helpers
//!
//! Remote paths are plain slash-delimited strings. They never touch the local
//! filesystem, so `std::path` is deliberately not used here.

pub const ROOT: &str = "/";

/// Normalize a remote path into `/a/b/c` form.
///
/// Repeated slashes collapse, `.` segments are dropped, `..` pops a segment
/// but never climbs above root, and a trailing slash is removed.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        ROOT.to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Parent of a normalized path; root is its own parent
pub fn parent(path: &str) -> String {
    if path == ROOT {
        return ROOT.to_string();
    }

    match path.rfind('/') {
        Some(0) | None => ROOT.to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Join a child name onto a directory path
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// One clickable element of the breadcrumb trail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub label: String,
    pub path: String,
}

/// Breadcrumb trail for a path, always starting at root
pub fn breadcrumbs(path: &str) -> Vec<Crumb> {
    let mut crumbs = vec![Crumb {
        label: ROOT.to_string(),
        path: ROOT.to_string(),
    }];

    let mut cumulative = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        cumulative.push('/');
        cumulative.push_str(part);
        crumbs.push(Crumb {
            label: part.to_string(),
            path: cumulative.clone(),
        });
    }

    crumbs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("pub"), "/pub");
        assert_eq!(normalize("//pub///data/"), "/pub/data");
        assert_eq!(normalize("/pub/./data"), "/pub/data");
        assert_eq!(normalize("/pub/data/../incoming"), "/pub/incoming");
        assert_eq!(normalize("/../../etc"), "/etc");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("/"), "/");
        assert_eq!(parent("/pub"), "/");
        assert_eq!(parent("/pub/data"), "/pub");
        assert_eq!(parent("/a/b/c"), "/a/b");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "pub"), "/pub");
        assert_eq!(join("/pub", "data"), "/pub/data");
    }

    #[test]
    fn test_breadcrumbs() {
        let crumbs = breadcrumbs("/pub/data");
        let paths: Vec<&str> = crumbs.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/pub", "/pub/data"]);
        assert_eq!(crumbs[2].label, "data");

        assert_eq!(breadcrumbs("/").len(), 1);
    }
}

//! Page locator insertion and image placement (§4.4 steps 4-5).

use std::collections::{BTreeMap, HashMap, HashSet};

use super::extractor::ImageRecord;

/// A line is a page-break marker if its trimmed content is one of the three
/// common Markdown thematic-break spellings, or it contains a form feed.
/// This is a known-lossy heuristic (§9 open questions) — legitimate content
/// using `---` as a literal line can trigger a spurious page boundary.
fn is_page_break_marker(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed == "---" || trimmed == "***" || trimmed == "___" || line.contains('\u{0C}')
}

/// Prepends `<!-- Page 1 / N -->` and inserts `<!-- Page k / N -->` after
/// every page-break marker line, incrementing `k`. `N` is the authoritative
/// page count from the extractor, not derived from marker count.
#[must_use]
pub fn insert_page_locators(markdown: &str, page_count: u32) -> String {
    let mut out = String::new();
    out.push_str(&format!("<!-- Page 1 / {page_count} -->\n"));

    let mut next_page = 2u32;
    for line in markdown.lines() {
        out.push_str(line);
        out.push('\n');
        if is_page_break_marker(line) {
            out.push_str(&format!("<!-- Page {next_page} / {page_count} -->\n"));
            next_page += 1;
        }
    }
    out
}

/// Walks `markdown` (already locator-tagged) and, after each page-break
/// marker, emits the images belonging to the page that just ended. Images
/// for the final page (no trailing break follows it) flush at the end, in
/// `(page, index)` order — as do any other pages the walk never reached.
#[must_use]
pub fn place_images(
    markdown: &str,
    images: &[ImageRecord],
    image_paths: &HashMap<String, String>,
) -> String {
    let mut by_page: BTreeMap<u32, Vec<&ImageRecord>> = BTreeMap::new();
    for image in images {
        by_page.entry(image.page).or_default().push(image);
    }
    for group in by_page.values_mut() {
        group.sort_by_key(|image| image.index);
    }

    let mut placed: HashSet<u32> = HashSet::new();
    let mut out = String::new();
    let mut current_page = 1u32;

    for line in markdown.lines() {
        out.push_str(line);
        out.push('\n');
        if is_page_break_marker(line) {
            emit_page_images(&mut out, current_page, &by_page, image_paths, &mut placed);
            current_page += 1;
        }
    }

    for page in by_page.keys().copied().collect::<Vec<_>>() {
        emit_page_images(&mut out, page, &by_page, image_paths, &mut placed);
    }

    out
}

fn emit_page_images(
    out: &mut String,
    page: u32,
    by_page: &BTreeMap<u32, Vec<&ImageRecord>>,
    image_paths: &HashMap<String, String>,
    placed: &mut HashSet<u32>,
) {
    if !placed.insert(page) {
        return;
    }
    let Some(images) = by_page.get(&page) else { return };
    for image in images {
        if let Some(path) = image_paths.get(&image.image_id) {
            out.push('\n');
            out.push_str(&format!("![{}]({})\n", image.image_id, path));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str, page: u32, index: u32) -> ImageRecord {
        ImageRecord {
            image_id: id.to_string(),
            page,
            index,
            raw_bytes: Vec::new(),
            format_hint: None,
            width: None,
            height: None,
            context_before: String::new(),
            context_after: String::new(),
        }
    }

    #[test]
    fn test_single_page_gets_only_initial_locator() {
        let markdown = "# Title\n\nSome text.\n";
        let out = insert_page_locators(markdown, 1);
        assert_eq!(out.matches("<!-- Page").count(), 1);
        assert!(out.starts_with("<!-- Page 1 / 1 -->\n"));
    }

    #[test]
    fn test_page_breaks_increment_locator() {
        let markdown = "Page one.\n---\nPage two.\n***\nPage three.\n";
        let out = insert_page_locators(markdown, 3);
        assert!(out.contains("<!-- Page 1 / 3 -->"));
        assert!(out.contains("<!-- Page 2 / 3 -->"));
        assert!(out.contains("<!-- Page 3 / 3 -->"));
        // Locator for page 2 appears after the first break, before page three's text.
        let break_pos = out.find("---").unwrap();
        let page2_pos = out.find("<!-- Page 2 / 3 -->").unwrap();
        assert!(page2_pos > break_pos);
    }

    #[test]
    fn test_form_feed_counts_as_break() {
        let markdown = "Page one.\n\u{0C}\nPage two.\n";
        let out = insert_page_locators(markdown, 2);
        assert!(out.contains("<!-- Page 2 / 2 -->"));
    }

    #[test]
    fn test_place_images_emits_after_break_for_completed_page() {
        let markdown = insert_page_locators("Page one.\n---\nPage two.\n", 2);
        let images = vec![image("p1-i1", 1, 1)];
        let mut paths = HashMap::new();
        paths.insert("p1-i1".to_string(), "images/p1-i1.png".to_string());

        let out = place_images(&markdown, &images, &paths);
        let break_pos = out.find("---").unwrap();
        let image_pos = out.find("![p1-i1]").unwrap();
        let page_two_pos = out.find("Page two.").unwrap();
        assert!(image_pos > break_pos);
        assert!(image_pos < page_two_pos);
    }

    #[test]
    fn test_place_images_sorts_within_page_by_index() {
        let markdown = insert_page_locators("Page one.\n", 1);
        let images = vec![image("p1-i2", 1, 2), image("p1-i1", 1, 1)];
        let mut paths = HashMap::new();
        paths.insert("p1-i1".to_string(), "images/p1-i1.png".to_string());
        paths.insert("p1-i2".to_string(), "images/p1-i2.png".to_string());

        let out = place_images(&markdown, &images, &paths);
        let pos1 = out.find("![p1-i1]").unwrap();
        let pos2 = out.find("![p1-i2]").unwrap();
        assert!(pos1 < pos2);
    }

    #[test]
    fn test_unplaced_trailing_page_images_flush_at_end() {
        let markdown = insert_page_locators("Only page.\n", 1);
        let images = vec![image("p1-i1", 1, 1)];
        let mut paths = HashMap::new();
        paths.insert("p1-i1".to_string(), "images/p1-i1.png".to_string());

        let out = place_images(&markdown, &images, &paths);
        assert!(out.trim_end().ends_with("![p1-i1](images/p1-i1.png)"));
    }

    #[test]
    fn test_image_missing_from_path_map_is_skipped() {
        let markdown = insert_page_locators("Only page.\n", 1);
        let images = vec![image("p1-i1", 1, 1)];
        let paths = HashMap::new();

        let out = place_images(&markdown, &images, &paths);
        assert!(!out.contains("![p1-i1]"));
    }
}

//! Shared listing logic for backends that hold their keys in sorted order.

use super::traits::{ListPage, ListRequest, ObjectMeta};

/// Cut one page out of a key-ordered sequence of objects.
///
/// The continuation token is the last key or common prefix the previous page
/// returned. When it is a common prefix, every key rolled up under it was
/// already accounted for and is skipped too.
pub(crate) fn build_page<I>(sorted: I, request: &ListRequest<'_>) -> ListPage
where
    I: IntoIterator<Item = ObjectMeta>,
{
    let max_keys = request.max_keys.max(1);
    let skip_under = request.continuation.filter(|token| {
        request
            .delimiter
            .is_some_and(|d| token.len() > request.prefix.len() && token.ends_with(d))
    });

    let mut page = ListPage::default();
    let mut last_marker: Option<String> = None;
    let mut emitted = 0;

    for meta in sorted {
        if !meta.key.starts_with(request.prefix) {
            continue;
        }
        if request
            .continuation
            .is_some_and(|token| meta.key.as_str() <= token)
        {
            continue;
        }
        if skip_under.is_some_and(|rolled| meta.key.starts_with(rolled)) {
            continue;
        }

        let rest = &meta.key[request.prefix.len()..];
        let rollup = request.delimiter.and_then(|d| {
            rest.find(d)
                .map(|idx| format!("{}{}", request.prefix, &rest[..idx + d.len_utf8()]))
        });

        match rollup {
            Some(common) => {
                if page.common_prefixes.last() == Some(&common) {
                    continue;
                }
                if emitted == max_keys {
                    page.next_token = last_marker;
                    return page;
                }
                last_marker = Some(common.clone());
                page.common_prefixes.push(common);
            }
            None => {
                if emitted == max_keys {
                    page.next_token = last_marker;
                    return page;
                }
                last_marker = Some(meta.key.clone());
                page.objects.push(meta);
            }
        }
        emitted += 1;
    }

    page
}

/// Place name used when rendering a query preview for the search box.
pub const PREVIEW_PLACE_NAME: &str = "{state name}";

const PLACEHOLDER: char = '_';

/// Build the search phrase for one region.
///
/// Every run of underscores is replaced by `place_name`. A query without a
/// placeholder gets the place name appended after a single space.
pub fn substitute(query: &str, place_name: &str) -> String {
    if !query.contains(PLACEHOLDER) {
        return format!("{query} {place_name}");
    }

    // Trailing space keeps a placeholder at the very end separated from
    // whatever the provider appends.
    let padded = format!("{query} ");
    let mut out = String::with_capacity(padded.len() + place_name.len());
    let mut in_run = false;
    for ch in padded.chars() {
        if ch == PLACEHOLDER {
            if !in_run {
                out.push_str(place_name);
                in_run = true;
            }
        } else {
            in_run = false;
            out.push(ch);
        }
    }
    out
}

pub fn preview(query: &str) -> String {
    substitute(query, PREVIEW_PLACE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_run_is_replaced_with_place_name() {
        assert_eq!(substitute("visit ___", "Texas"), "visit Texas ");
        assert_eq!(substitute("visit ___", "Texas").trim_end(), "visit Texas");
    }

    #[test]
    fn query_without_placeholder_appends_place_name() {
        assert_eq!(substitute("visit", "Texas"), "visit Texas");
    }

    #[test]
    fn every_run_is_replaced() {
        assert_eq!(
            substitute("see __ and __", "Ohio").trim_end(),
            "see Ohio and Ohio"
        );
        assert_eq!(substitute("_a_", "X"), "XaX ");
    }

    #[test]
    fn single_underscore_counts_as_placeholder() {
        assert_eq!(substitute("why is _ so", "Utah"), "why is Utah so ");
    }

    #[test]
    fn preview_uses_fixed_place_name() {
        assert_eq!(preview("best ___ food"), "best {state name} food ");
        assert_eq!(preview("weather"), "weather {state name}");
    }
}

//! Compiling locators to injected JavaScript
//!
//! Checks address elements the way a user sees them (role and accessible
//! name, label text, test ids) rather than by brittle CSS paths. Each
//! locator compiles to a query expression evaluated in the page; the
//! locator itself travels as a JSON literal so text filters can never
//! break out of the script.
//!
//! Interaction uses a tag-and-resolve scheme: the query marks its hit
//! with a `data-sf-hit` attribute, the harness resolves that attribute
//! to a DOM handle, then removes the tag. Clicks and typing then go
//! through real CDP input events instead of synthetic JS events.

use smokefleet_common::Locator;

/// Shared query and visibility helpers injected ahead of each expression.
///
/// `Q(spec)` resolves a locator spec to an element or null. The role
/// engine approximates the ARIA accessible-name computation: explicit
/// aria attributes first, then associated labels, then placeholder,
/// title, alt and text content. Name filters are whitespace-normalized;
/// non-exact matching is a case-insensitive substring test.
const HELPERS: &str = r#"
const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
const nameMatches = (actual, want, exact) => {
  const a = norm(actual);
  const w = norm(want);
  if (!w) return true;
  return exact ? a === w : a.toLowerCase().includes(w.toLowerCase());
};
const accName = (el) => {
  const aria = el.getAttribute('aria-label');
  if (aria) return aria;
  const refs = el.getAttribute('aria-labelledby');
  if (refs) {
    const joined = refs
      .split(/\s+/)
      .map((id) => { const r = document.getElementById(id); return r ? r.innerText : ''; })
      .join(' ');
    if (norm(joined)) return joined;
  }
  if (el.labels && el.labels.length) {
    return Array.from(el.labels).map((l) => l.innerText).join(' ');
  }
  const ph = el.getAttribute('placeholder');
  if (ph) return ph;
  const title = el.getAttribute('title');
  if (title) return title;
  const alt = el.getAttribute('alt');
  if (alt) return alt;
  return el.innerText || el.value || '';
};
const ROLE_SELECTORS = {
  button: 'button, [role="button"], input[type="submit"], input[type="button"]',
  link: 'a[href], [role="link"]',
  textbox: 'input:not([type]), input[type="text"], input[type="password"], input[type="email"], input[type="search"], input[type="url"], input[type="tel"], input[type="number"], textarea, [role="textbox"]',
  searchbox: 'input[type="search"], [role="searchbox"]',
  combobox: 'select, [role="combobox"]',
  heading: 'h1, h2, h3, h4, h5, h6, [role="heading"]',
  checkbox: 'input[type="checkbox"], [role="checkbox"]',
  menuitem: '[role="menuitem"]',
  listitem: 'li, [role="listitem"]',
  img: 'img, [role="img"]',
};
const Q = (spec) => {
  switch (spec.by) {
    case 'css':
      return document.querySelector(spec.selector);
    case 'test_id': {
      const esc = spec.value.replace(/(["\\])/g, '\\$1');
      return document.querySelector('[data-testid="' + esc + '"]');
    }
    case 'role': {
      const sel = ROLE_SELECTORS[spec.role] || '[role="' + spec.role + '"]';
      const els = Array.from(document.querySelectorAll(sel));
      return els.find((el) => nameMatches(accName(el), spec.name, spec.exact)) || null;
    }
    case 'text': {
      const want = norm(spec.text);
      const hit = (el) => {
        const t = norm(el.innerText);
        return spec.exact ? t === want : t.toLowerCase().includes(want.toLowerCase());
      };
      const hits = Array.from(document.querySelectorAll('body *')).filter((el) => el.innerText && hit(el));
      return hits.find((el) => !hits.some((o) => o !== el && el.contains(o))) || hits[0] || null;
    }
    case 'label': {
      const want = norm(spec.text).toLowerCase();
      for (const l of Array.from(document.querySelectorAll('label'))) {
        if (!norm(l.innerText).toLowerCase().includes(want)) continue;
        if (l.htmlFor) {
          const c = document.getElementById(l.htmlFor);
          if (c) return c;
        }
        const c = l.querySelector('input, select, textarea');
        if (c) return c;
      }
      const inputs = Array.from(document.querySelectorAll('input, select, textarea'));
      return inputs.find((el) => nameMatches(accName(el), spec.text, false)) || null;
    }
    default:
      return null;
  }
};
const VIS = (el) => {
  if (!el) return false;
  const rect = el.getBoundingClientRect();
  if (rect.width <= 0 || rect.height <= 0) return false;
  const style = window.getComputedStyle(el);
  return style.visibility !== 'hidden' && style.display !== 'none';
};
"#;

/// Locator as a JSON literal for embedding in a script
fn spec_json(locator: &Locator) -> String {
    serde_json::to_string(locator).unwrap_or_else(|_| "null".to_string())
}

/// Expression returning whether the locator resolves to a visible element
pub fn visible_js(locator: &Locator) -> String {
    format!(
        "(() => {{ {helpers} return VIS(Q({spec})); }})()",
        helpers = HELPERS,
        spec = spec_json(locator)
    )
}

/// Expression returning the element's innerText, or null when absent
pub fn text_js(locator: &Locator) -> String {
    format!(
        "(() => {{ {helpers} const el = Q({spec}); return el ? el.innerText : null; }})()",
        helpers = HELPERS,
        spec = spec_json(locator)
    )
}

/// Expression tagging a visible hit with `data-sf-hit` for native
/// resolution. Returns whether an element was tagged.
pub fn tag_js(locator: &Locator, token: u64) -> String {
    format!(
        "(() => {{ {helpers} const el = Q({spec}); if (!VIS(el)) return false; \
         el.setAttribute('data-sf-hit', '{token}'); return true; }})()",
        helpers = HELPERS,
        spec = spec_json(locator),
        token = token
    )
}

/// CSS selector matching the element tagged with `token`
pub fn hit_selector(token: u64) -> String {
    format!("[data-sf-hit=\"{}\"]", token)
}

/// Expression removing the tag again
pub fn untag_js(token: u64) -> String {
    format!(
        "(() => {{ const el = document.querySelector('[data-sf-hit=\"{token}\"]'); \
         if (el) el.removeAttribute('data-sf-hit'); return true; }})()",
        token = token
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Locator::css("#login"), "\"by\":\"css\"" ; "css tag")]
    #[test_case(Locator::test_id("data-testid Login button"), "\"by\":\"test_id\"" ; "testid tag")]
    #[test_case(Locator::role("button", "Sign In"), "\"by\":\"role\"" ; "role tag")]
    #[test_case(Locator::text("Please sign in"), "\"by\":\"text\"" ; "text tag")]
    #[test_case(Locator::label("Password"), "\"by\":\"label\"" ; "label tag")]
    fn test_spec_json_tags(locator: Locator, expected: &str) {
        assert!(spec_json(&locator).contains(expected));
    }

    #[test]
    fn test_text_filters_cannot_escape_the_script() {
        let hostile = Locator::role("button", "a\"); alert(1); (\"");
        let js = visible_js(&hostile);
        // the payload only ever appears JSON-escaped
        assert!(!js.contains("a\"); alert(1)"));
        assert!(js.contains("a\\\"); alert(1)"));

        let backslashes = Locator::text("C:\\Users\\smoke");
        let js = text_js(&backslashes);
        assert!(js.contains("C:\\\\Users\\\\smoke"));
    }

    #[test]
    fn test_visible_js_checks_geometry_and_style() {
        let js = visible_js(&Locator::css("#app"));
        assert!(js.contains("getBoundingClientRect"));
        assert!(js.contains("getComputedStyle"));
    }

    #[test]
    fn test_role_engine_includes_common_roles() {
        let js = visible_js(&Locator::role("textbox", "User"));
        for fragment in ["input[type=\"password\"]", "textarea", "[role=\"textbox\"]"] {
            assert!(js.contains(fragment), "missing {}", fragment);
        }
    }

    #[test]
    fn test_tag_untag_use_matching_selector() {
        let tag = tag_js(&Locator::role("button", "Login"), 7);
        assert!(tag.contains("'data-sf-hit', '7'"));
        assert_eq!(hit_selector(7), "[data-sf-hit=\"7\"]");
        assert!(untag_js(7).contains("[data-sf-hit=\"7\"]"));
    }

    #[test]
    fn test_empty_role_name_matches_any() {
        // listitem checks assert presence of any item, not a named one
        let js = visible_js(&Locator::role("listitem", ""));
        assert!(js.contains("\"name\":\"\""));
        assert!(js.contains("if (!w) return true;"));
    }
}

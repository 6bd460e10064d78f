//! Test page loader

use crate::host::TabId;
use crate::result::ProbeResult;
use crate::session::TestContext;

/// Open the tour test page in a fresh, selected tab
///
/// Any previous test tab is closed first. Once the page has loaded, its
/// content window and tour API are stored in the session and `on_ready` runs
/// after the window has gained focus. There is no timeout on the load: a page
/// that never loads never calls `on_ready`.
///
/// `host` defaults to `config.default_host`.
pub fn load_test_page<F>(ctx: &TestContext, on_ready: F, host: Option<&str>) -> ProbeResult<TabId>
where
    F: FnOnce() + 'static,
{
    let browser = ctx.host();
    if let Some(previous) = ctx.take_test_tab() {
        browser.remove_tab(previous);
    }

    let origin = host.unwrap_or(ctx.config().default_host.as_str());
    let url = ctx.config().test_page_url(origin);
    let tab = browser.add_tab(&url)?;
    tracing::debug!(%tab, %url, "loading test page");

    ctx.set_test_tab(Some(tab));
    browser.select_tab(tab);

    let loaded_ctx = ctx.clone();
    browser.on_tab_load(
        tab,
        Box::new(move |window| {
            loaded_ctx.attach_content(window.clone());
            loaded_ctx
                .host()
                .wait_for_focus(Some(&window), Box::new(on_ready));
        }),
    );
    Ok(tab)
}

//! Chromium-backed [`PageDriver`] implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wayfinder_core_types::{persist_selector, ElementCapability};

use crate::errors::DriverError;
use crate::{humanize, PageDriver, TypeOutcome};

/// Realistic desktop user agent; automation fingerprints are softened at
/// launch, not hidden.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Launch-time settings for the Chromium instance.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
    /// Extra Chromium switches appended to the softening defaults.
    pub extra_args: Vec<String>,
    /// Per-character typing delay bounds in milliseconds.
    pub typing_delay_ms: (u64, u64),
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: false,
            viewport_width: 1440,
            viewport_height: 900,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            extra_args: Vec::new(),
            typing_delay_ms: (50, 125),
        }
    }
}

impl DriverConfig {
    /// Builder: run without a visible window.
    pub fn headless(mut self, enabled: bool) -> Self {
        self.headless = enabled;
        self
    }
}

/// [`PageDriver`] over a dedicated Chromium page.
///
/// One driver owns one page; concurrent agent runs each launch their own.
pub struct CdpDriver {
    browser: Mutex<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    config: DriverConfig,
}

impl CdpDriver {
    /// Launch Chromium with fingerprint-softening switches and open the
    /// agent's page.
    pub async fn launch(config: DriverConfig) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder()
            .window_size(config.viewport_width, config.viewport_height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-sandbox");
        if !config.headless {
            builder = builder.with_head();
        }
        for arg in &config.extra_args {
            builder = builder.arg(arg);
        }
        let browser_config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| DriverError::Launch(err.to_string()))?;

        // The handler stream must be drained for the CDP connection to
        // make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "cdp handler event error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| DriverError::Launch(err.to_string()))?;
        page.set_user_agent(config.user_agent.as_str())
            .await
            .map_err(|err| DriverError::Launch(err.to_string()))?;

        info!(
            headless = config.headless,
            width = config.viewport_width,
            height = config.viewport_height,
            "chromium launched"
        );

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler_task,
            config,
        })
    }

    /// Close the browser and stop the handler task.
    pub async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(err) = browser.close().await {
            warn!(error = %err, "browser close failed");
        }
        self.handler_task.abort();
    }

    async fn find(&self, element_id: u32) -> Result<chromiumoxide::Element, DriverError> {
        self.page
            .find_element(persist_selector(element_id))
            .await
            .map_err(|_| DriverError::missing_element(element_id))
    }

    async fn eval(&self, script: String) -> Result<Value, DriverError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|err| DriverError::Evaluation(err.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn dispatch_enter(&self, phase: DispatchKeyEventType) -> Result<(), DriverError> {
        let is_key_down = matches!(phase, DispatchKeyEventType::KeyDown);
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(phase)
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13)
            .native_virtual_key_code(13);
        if is_key_down {
            builder = builder.text("\r");
        }
        let params = builder.build().map_err(DriverError::Input)?;
        self.page
            .execute(params)
            .await
            .map_err(|err| DriverError::Input(err.to_string()))?;
        Ok(())
    }

    /// Dispatch synthetic hover events so hover-revealed UI (custom
    /// scrollbars, menus) wakes up before we scroll a container.
    async fn hover_selector(&self, selector: &str) -> Result<(), DriverError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.dispatchEvent(new MouseEvent('mouseover', {{ bubbles: true }}));
                el.dispatchEvent(new MouseEvent('mousemove', {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = js_string(selector)
        );
        match self.eval(script).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(DriverError::ElementNotFound(selector.to_string())),
        }
    }

    async fn autocomplete_open(&self, selector: &str) -> Result<bool, DriverError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (el && el.getAttribute('aria-expanded') === 'true') return true;
                const popups = document.querySelectorAll(
                    '[role="listbox"], ul[role="menu"], [class*="autocomplete"], [class*="suggest"]'
                );
                for (const popup of popups) {{
                    const rect = popup.getBoundingClientRect();
                    if (rect.width > 2 && rect.height > 2) return true;
                }}
                return false;
            }})()"#,
            sel = js_string(selector)
        );
        Ok(matches!(self.eval(script).await?, Value::Bool(true)))
    }
}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        debug!(url, "navigating");
        self.page
            .goto(url)
            .await
            .map_err(|err| DriverError::Navigation(err.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|err| DriverError::Navigation(err.to_string()))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|err| DriverError::Transport(err.to_string()))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn evaluate(&self, script: &str) -> Result<Value, DriverError> {
        self.eval(script.to_string()).await
    }

    async fn screenshot_jpeg(&self, quality: u8) -> Result<Vec<u8>, DriverError> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Jpeg)
                    .quality(i64::from(quality))
                    .build(),
            )
            .await
            .map_err(|err| DriverError::Screenshot(err.to_string()))
    }

    async fn wait_dom_ready(&self, timeout: Duration) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() >= deadline {
                return Err(DriverError::WaitTimeout("document never became ready".into()));
            }
            let ready = self
                .eval("document.readyState".to_string())
                .await?
                .as_str()
                .map(|state| matches!(state, "interactive" | "complete"))
                .unwrap_or(false);
            if ready {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn wait_network_quiet(&self, timeout: Duration) -> Result<(), DriverError> {
        // Approximate quiescence: the resource-timing count stops growing
        // for two consecutive samples (~500 ms window).
        let deadline = Instant::now() + timeout;
        let mut last_count: Option<u64> = None;
        let mut stable_samples = 0u32;
        loop {
            if Instant::now() >= deadline {
                return Err(DriverError::WaitTimeout("network never went quiet".into()));
            }
            let count = self
                .eval("performance.getEntriesByType('resource').length".to_string())
                .await?
                .as_u64();
            match (count, last_count) {
                (Some(now), Some(prev)) if now == prev => {
                    stable_samples += 1;
                    if stable_samples >= 2 {
                        return Ok(());
                    }
                }
                _ => stable_samples = 0,
            }
            last_count = count;
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn press_enter(&self) -> Result<(), DriverError> {
        self.dispatch_enter(DispatchKeyEventType::KeyDown).await?;
        self.dispatch_enter(DispatchKeyEventType::KeyUp).await
    }

    async fn element_exists(&self, element_id: u32) -> Result<bool, DriverError> {
        let script = format!(
            "document.querySelector({sel}) !== null",
            sel = js_string(&persist_selector(element_id))
        );
        Ok(matches!(self.eval(script).await?, Value::Bool(true)))
    }

    async fn describe_element(&self, element_id: u32) -> Result<ElementCapability, DriverError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return null;
                return {{
                    tag_name: el.tagName.toLowerCase(),
                    role: el.getAttribute('role'),
                    input_type: el.getAttribute('type'),
                    content_editable: el.isContentEditable === true,
                }};
            }})()"#,
            sel = js_string(&persist_selector(element_id))
        );
        let value = self.eval(script).await?;
        if value.is_null() {
            return Err(DriverError::missing_element(element_id));
        }
        serde_json::from_value(value).map_err(|err| DriverError::Evaluation(err.to_string()))
    }

    async fn click_element(&self, element_id: u32) -> Result<(), DriverError> {
        let element = self.find(element_id).await?;
        element
            .scroll_into_view()
            .await
            .map_err(|err| DriverError::Input(err.to_string()))?;
        self.pace(300, 700).await;
        self.hover_selector(&persist_selector(element_id)).await?;
        self.pace(100, 200).await;
        element
            .click()
            .await
            .map_err(|err| DriverError::Input(err.to_string()))?;
        Ok(())
    }

    async fn type_into_element(
        &self,
        element_id: u32,
        text: &str,
    ) -> Result<TypeOutcome, DriverError> {
        let capability = self.describe_element(element_id).await?;
        if !capability.is_typeable() {
            return Err(DriverError::NotTypeable(format!(
                "tag id {element_id} resolves to <{}>",
                capability.tag_name
            )));
        }

        let element = self.find(element_id).await?;
        element
            .scroll_into_view()
            .await
            .map_err(|err| DriverError::Input(err.to_string()))?;
        self.pace(200, 500).await;
        element
            .focus()
            .await
            .map_err(|err| DriverError::Input(err.to_string()))?;
        self.pace(100, 200).await;

        // Clear any existing value before typing.
        let selector = persist_selector(element_id);
        let clear = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (el && 'value' in el) el.value = '';
            }})()"#,
            sel = js_string(&selector)
        );
        self.eval(clear).await?;

        let (min_delay, max_delay) = self.config.typing_delay_ms;
        for ch in text.chars() {
            element
                .type_str(ch.to_string())
                .await
                .map_err(|err| DriverError::Input(err.to_string()))?;
            humanize::random_delay(min_delay, max_delay).await;
        }
        self.pace(200, 400).await;

        let autocomplete_open = self.autocomplete_open(&selector).await?;
        Ok(TypeOutcome { autocomplete_open })
    }

    async fn select_option(&self, element_id: u32, value: &str) -> Result<(), DriverError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return 'missing';
                if (el.tagName.toLowerCase() !== 'select') return 'not-select';
                const wanted = {value};
                let matched = null;
                for (const option of el.options) {{
                    if (option.value === wanted || option.label === wanted
                        || option.text.trim() === wanted) {{
                        matched = option;
                        break;
                    }}
                }}
                if (!matched) return 'no-option';
                el.value = matched.value;
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return 'ok';
            }})()"#,
            sel = js_string(&persist_selector(element_id)),
            value = js_string(value)
        );
        match self.eval(script).await?.as_str() {
            Some("ok") => Ok(()),
            Some("missing") => Err(DriverError::missing_element(element_id)),
            Some("not-select") => Err(DriverError::Input(format!(
                "tag id {element_id} is not a native select"
            ))),
            Some("no-option") => Err(DriverError::OptionNotFound(format!(
                "no option matching \"{value}\" in tag id {element_id}"
            ))),
            other => Err(DriverError::Evaluation(format!(
                "unexpected select result: {other:?}"
            ))),
        }
    }

    async fn scroll_container(&self, element_id: u32, delta_y: i64) -> Result<(), DriverError> {
        let selector = persist_selector(element_id);
        self.hover_selector(&selector).await?;
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.scrollBy({{ top: {delta_y}, behavior: 'smooth' }});
                return true;
            }})()"#,
            sel = js_string(&selector)
        );
        match self.eval(script).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(DriverError::missing_element(element_id)),
        }
    }

    async fn scroll_page(&self, delta_y: i64) -> Result<(), DriverError> {
        self.eval(format!(
            "window.scrollBy({{ top: {delta_y}, behavior: 'smooth' }})"
        ))
        .await
        .map(|_| ())
    }

    async fn scroll_to_top(&self) -> Result<(), DriverError> {
        self.eval("window.scrollTo({ top: 0, behavior: 'smooth' })".to_string())
            .await
            .map(|_| ())
    }
}

/// Encode a Rust string as a JS string literal (JSON string syntax is a
/// subset of JS).
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(js_string(r#"[data-wf-id="5"]"#), r#""[data-wf-id=\"5\"]""#);
    }

    #[test]
    fn default_config_is_headed_with_realistic_viewport() {
        let config = DriverConfig::default();
        assert!(!config.headless);
        assert!(config.viewport_width >= 1280);
        assert!(config.user_agent.contains("Chrome"));
    }
}

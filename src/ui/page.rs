//! Server-rendered chat page.
//!
//! The page is a thin renderer: it reads state from `GET /api/chat`, follows
//! `GET /api/chat/events` and posts composer input back. All conversation
//! state stays in the controller.

use crate::config::AssistantConfig;

/// Characters the composer accepts per message.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Render the complete chat page for `assistant`.
#[must_use]
pub fn render_page(assistant: &AssistantConfig) -> String {
    let title = escape_html(&assistant.name);
    html_shell(&title, &chat_content(assistant))
}

fn html_shell(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="description" content="Skincare consultant chat">
    <title>{title}</title>
    <style>{STYLES}</style>
</head>
<body>
    <div id="app-shell">
        {content}
    </div>
    <script>{SCRIPT}</script>
</body>
</html>"#
    )
}

fn chat_content(assistant: &AssistantConfig) -> String {
    let name = escape_html(&assistant.name);
    let clear = escape_html(&assistant.clear_chat_text);
    format!(
        r#"
    <header class="chat-header">
        <h1>{name}</h1>
        <button id="clear-chat" type="button" class="ghost">{clear}</button>
    </header>

    <main id="wall" class="wall" aria-live="polite"></main>
    <div id="notice" class="notice" hidden></div>

    <form id="composer" class="composer">
        <textarea
            id="composer-input"
            name="message"
            rows="1"
            maxlength="{MAX_MESSAGE_CHARS}"
            placeholder="Ask about your skin, routine or ingredients..."
        ></textarea>
        <span id="spinner" class="spinner" hidden></span>
        <button id="send" type="submit" disabled>Send</button>
        <button id="stop" type="button" hidden>Stop</button>
    </form>
    <p class="hint">Press Enter to send, Shift+Enter for new line</p>
"#
    )
}

/// Minimal escaping for text interpolated into markup.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLES: &str = r"
* { box-sizing: border-box; }
body { margin: 0; font-family: system-ui, sans-serif; background: #fdf6f8; color: #2b2226; }
#app-shell { display: flex; flex-direction: column; height: 100vh; max-width: 56rem; margin: 0 auto; }
.chat-header { display: flex; align-items: center; justify-content: space-between; padding: 0.75rem 1rem; border-bottom: 1px solid #f0d9e0; }
.chat-header h1 { font-size: 1.125rem; margin: 0; }
.wall { flex: 1; overflow-y: auto; padding: 1rem; display: flex; flex-direction: column; gap: 0.75rem; }
.msg { max-width: 80%; padding: 0.625rem 0.875rem; border-radius: 1rem; white-space: pre-wrap; line-height: 1.45; }
.msg.user { align-self: flex-end; background: #e05d8a; color: #fff; }
.msg.assistant { align-self: flex-start; background: #fff; border: 1px solid #f0d9e0; }
.msg .took { display: block; margin-top: 0.25rem; font-size: 0.75rem; opacity: 0.6; }
.notice { margin: 0 1rem; padding: 0.5rem 0.75rem; border-radius: 0.5rem; background: #e8f6ee; font-size: 0.875rem; }
.composer { display: flex; gap: 0.5rem; align-items: flex-end; padding: 0.75rem 1rem; border-top: 1px solid #f0d9e0; }
.composer textarea { flex: 1; resize: none; min-height: 2.75rem; max-height: 12rem; padding: 0.625rem 0.75rem; border-radius: 0.75rem; border: 1px solid #e6c7d2; font: inherit; }
button { border: 0; border-radius: 0.75rem; padding: 0.625rem 1rem; background: #e05d8a; color: #fff; font: inherit; cursor: pointer; }
button:disabled { opacity: 0.5; cursor: default; }
button.ghost { background: transparent; color: inherit; border: 1px solid #e6c7d2; }
.spinner { width: 1.25rem; height: 1.25rem; margin-bottom: 0.75rem; border: 2px solid #e6c7d2; border-top-color: #e05d8a; border-radius: 50%; animation: spin 0.8s linear infinite; }
.hint { margin: 0 0 0.75rem; text-align: center; font-size: 0.75rem; opacity: 0.6; }
@keyframes spin { to { transform: rotate(360deg); } }
";

const SCRIPT: &str = r#"
(() => {
  const wall = document.getElementById('wall');
  const input = document.getElementById('composer-input');
  const form = document.getElementById('composer');
  const send = document.getElementById('send');
  const stop = document.getElementById('stop');
  const spinner = document.getElementById('spinner');
  const notice = document.getElementById('notice');
  const state = { status: 'ready', durations: {} };

  const textOf = (m) => m.parts.filter(p => p.type === 'text').map(p => p.text).join('');

  function bubble(id) {
    return wall.querySelector(`[data-id="${CSS.escape(id)}"]`);
  }

  function renderDuration(id) {
    const el = bubble(id);
    const ms = state.durations[id];
    if (!el || ms === undefined) return;
    let took = el.querySelector('.took');
    if (!took) {
      took = document.createElement('span');
      took.className = 'took';
      el.appendChild(took);
    }
    took.textContent = `${(ms / 1000).toFixed(1)}s`;
  }

  function append(m) {
    if (bubble(m.id)) return;
    const el = document.createElement('div');
    el.className = `msg ${m.role}`;
    el.dataset.id = m.id;
    const body = document.createElement('span');
    body.className = 'body';
    body.textContent = textOf(m);
    el.appendChild(body);
    wall.appendChild(el);
    renderDuration(m.id);
    wall.scrollTop = wall.scrollHeight;
  }

  function applyStatus(status) {
    state.status = status;
    const busy = status === 'submitted' || status === 'streaming';
    spinner.hidden = status !== 'submitted';
    stop.hidden = !busy;
    send.hidden = busy;
    input.disabled = status === 'streaming';
    send.disabled = busy || input.value.trim() === '';
  }

  function flash(text) {
    notice.textContent = text;
    notice.hidden = false;
    setTimeout(() => { notice.hidden = true; }, 2500);
  }

  async function load() {
    const res = await fetch('/api/chat');
    const snap = await res.json();
    wall.replaceChildren();
    state.durations = snap.durations || {};
    snap.messages.forEach(append);
    applyStatus(snap.status);
  }

  function follow() {
    const events = new EventSource('/api/chat/events');
    events.onmessage = (e) => {
      const ev = JSON.parse(e.data);
      switch (ev.type) {
        case 'status': applyStatus(ev.data.status); break;
        case 'message.appended': append(ev.data.message); break;
        case 'message.delta': {
          const body = bubble(ev.data.id)?.querySelector('.body');
          if (body) body.textContent += ev.data.text;
          wall.scrollTop = wall.scrollHeight;
          break;
        }
        case 'duration.recorded':
          state.durations[ev.data.id] = ev.data.elapsed_ms;
          renderDuration(ev.data.id);
          break;
        case 'cleared': wall.replaceChildren(); state.durations = {}; break;
        case 'resync': load(); break;
      }
    };
  }

  async function submit() {
    const message = input.value.trim();
    if (!message || send.disabled) return;
    const res = await fetch('/api/chat', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ message }),
    });
    if (res.status === 202) {
      input.value = '';
      input.style.height = 'auto';
    } else {
      flash(await res.text());
    }
  }

  form.addEventListener('submit', (e) => { e.preventDefault(); submit(); });
  input.addEventListener('keydown', (e) => {
    if (e.key === 'Enter' && !e.shiftKey) { e.preventDefault(); submit(); }
  });
  input.addEventListener('input', () => {
    input.style.height = 'auto';
    input.style.height = Math.min(input.scrollHeight, 192) + 'px';
    applyStatus(state.status);
  });
  stop.addEventListener('click', () => fetch('/api/chat/stop', { method: 'POST' }));
  document.getElementById('clear-chat').addEventListener('click', async () => {
    const res = await fetch('/api/chat/clear', { method: 'POST' });
    const body = await res.json();
    if (body.cleared) flash(body.notice);
    await load();
  });

  follow();
  load();
})();
"#;

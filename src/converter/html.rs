//! HTML document for converted presentations.
//!
//! The document is a single page: a media stage, a status line and a small
//! script that replays the engine's transition table against the embedded
//! deck. Media `ended` events (or the declared duration for stills) drive
//! auto-advance; any key press cancels the pending timer.

use super::artifact::{ArtifactDeck, DECK_TAG_OPEN};
use crate::error::Result;
use crate::types::{AspectRatio, Transition};

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Render the complete document for `deck`.
///
/// Placeholders are filled in a single pass, so text coming from the deck is
/// never scanned for further placeholders.
pub fn render(deck: &ArtifactDeck) -> Result<String> {
    let (width, height) = deck.settings.resolution;
    let title = escape_html(&deck.name);
    let deck_json = deck.to_script_json()?;

    let mut out = String::with_capacity(TEMPLATE.len() + deck_json.len());
    let mut rest = TEMPLATE;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            rest = &rest[open..];
            break;
        };
        match &after[..close] {
            "title" => out.push_str(&title),
            "width" => out.push_str(&width.to_string()),
            "height" => out.push_str(&height.to_string()),
            "fit" => out.push_str(match deck.settings.aspect_ratio {
                AspectRatio::Keep => "contain",
                AspectRatio::Ignore => "fill",
            }),
            "fade" => out.push_str(match deck.settings.transition {
                Transition::Cut => "0s",
                Transition::Fade => "0.4s",
            }),
            "deck_open" => out.push_str(DECK_TAG_OPEN),
            "deck" => out.push_str(&deck_json),
            _ => out.push_str(&rest[open..open + close + 4]),
        }
        rest = &after[close + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

const TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{title}}</title>
<style>
  html, body { margin: 0; height: 100%; background: #000; color: #ddd; font-family: sans-serif; }
  #stage { position: absolute; inset: 0; display: flex; align-items: center; justify-content: center; }
  #stage video, #stage img {
    width: 100%; height: 100%; object-fit: {{fit}};
    aspect-ratio: {{width}} / {{height}};
    transition: opacity {{fade}} ease-in-out;
  }
  #stage .entering { opacity: 0; }
  #status { position: absolute; left: 0; right: 0; bottom: 0; padding: 4px 12px;
            font-size: 13px; background: rgba(0, 0, 0, 0.6); display: none; }
  #notes { white-space: pre-wrap; margin-top: 4px; }
  body.show-status #status { display: block; }
  #overview { position: absolute; inset: 0; display: none; flex-wrap: wrap; align-content: flex-start;
              gap: 12px; padding: 16px; overflow: auto; background: rgba(0, 0, 0, 0.92); }
  body.show-overview #overview { display: flex; }
  #overview .thumb { width: 200px; padding: 4px; background: #111; color: #ddd; border: 1px solid #333;
                     cursor: pointer; text-align: left; font: inherit; }
  #overview .thumb.current { border-color: #eee; }
  #overview .thumb img { display: block; width: 100%; aspect-ratio: {{width}} / {{height}}; object-fit: contain; }
</style>
</head>
<body>
<div id="stage"></div>
<div id="status"><span id="position"></span> <span id="mode"></span><div id="notes"></div></div>
<div id="overview"></div>
{{deck_open}}{{deck}}</script>
<script>
(function () {
  "use strict";
  var deck = JSON.parse(document.getElementById("deck-data").textContent);
  var slides = deck.slides;
  var stage = document.getElementById("stage");
  var overview = document.getElementById("overview");
  var state = { slide: 0, segment: 0, phase: "playing" };
  var timer = null;
  var paused = false;
  var typed = "";
  var shownKey = null;

  function loops(mode) { return mode !== "once"; }
  function lastSegment(i) { return slides[i].segments.length - 1; }
  function enter(i) { state = { slide: i, segment: 0, phase: "playing" }; }
  function hold(i) { state = { slide: i, segment: lastSegment(i), phase: "holding" }; }
  function settle(i) { if (loops(slides[i].mode)) { enter(i); } else { hold(i); } }

  function finish(i) {
    var s = slides[i];
    if (s.pause_at_end) { hold(i); return; }
    if (s.skip_to != null) { enter(s.skip_to); return; }
    if (i + 1 < slides.length) { enter(i + 1); return; }
    hold(i);
  }

  function advance() {
    if (state.ended) { return "end"; }
    var s = slides[state.slide];
    if (s.mode === "loop-until-advanced" && state.phase === "playing") {
      state.phase = "releasing";
      return "stayed";
    }
    if (s.skip_to != null) { enter(s.skip_to); return "moved"; }
    if (state.slide + 1 < slides.length) { enter(state.slide + 1); return "moved"; }
    if (loops(s.mode) && (state.phase === "playing" || state.phase === "releasing")) {
      state = { ended: true };
      return "ended";
    }
    return "end";
  }

  function retreat() {
    if (state.ended) { settle(slides.length - 1); return "moved"; }
    if (state.phase === "reversing") { settle(state.slide); return "stayed"; }
    var s = slides[state.slide];
    var target;
    if (s.reverse_to != null) { target = s.reverse_to; }
    else if (state.slide === 0) { return "start"; }
    else { target = state.slide - 1; }
    if (s.reverse) {
      state = { slide: target, segment: 0, phase: "reversing", from: state.slide };
    } else {
      settle(target);
    }
    return "moved";
  }

  function jump(i) {
    if (!(i >= 0 && i < slides.length)) { return "out-of-range"; }
    enter(i);
    return "moved";
  }

  function replay() {
    if (state.ended) { enter(slides.length - 1); return "moved"; }
    state = { slide: state.slide, segment: 0, phase: "playing" };
    return "stayed";
  }

  function mediaFinished() {
    if (state.ended || state.phase === "holding") { return; }
    if (state.phase === "reversing") { settle(state.slide); return; }
    var s = slides[state.slide];
    if (state.segment + 1 < s.segments.length) { state.segment += 1; return; }
    if (s.mode === "loop" || (s.mode === "loop-until-advanced" && state.phase === "playing")) {
      state.segment = 0;
      return;
    }
    finish(state.slide);
  }

  function cue() {
    if (state.ended) { return null; }
    if (state.phase === "reversing") {
      return { media: slides[state.from].reverse, held: false, key: "r" + state.from };
    }
    var media = slides[state.slide].segments[state.segment];
    return {
      media: media,
      held: state.phase === "holding",
      key: state.slide + ":" + state.segment
    };
  }

  function clearTimer() {
    if (timer !== null) { clearTimeout(timer); timer = null; }
  }

  function armTimer(media) {
    clearTimer();
    if (paused || media.duration == null) { return; }
    timer = setTimeout(function () { timer = null; step(mediaFinished, true); },
                       media.duration * 1000);
  }

  function show(restart) {
    var c = cue();
    updateStatus();
    updateOverview();
    if (c === null) {
      clearTimer();
      stage.innerHTML = "";
      shownKey = null;
      return;
    }
    var el = stage.firstElementChild;
    if (restart || shownKey !== c.key || !el) {
      stage.innerHTML = "";
      if (c.media.kind === "video") {
        el = document.createElement("video");
        el.muted = true;
        el.playsInline = true;
        el.addEventListener("ended", function () { step(mediaFinished, true); });
      } else {
        el = document.createElement("img");
      }
      el.className = "entering";
      el.src = c.media.src;
      stage.appendChild(el);
      requestAnimationFrame(function () { el.className = ""; });
      shownKey = c.key;
    }
    if (c.media.kind === "video") {
      clearTimer();
      if (c.held) {
        var toEnd = function () { el.currentTime = el.duration || 0; el.pause(); };
        if (el.readyState >= 1) { toEnd(); } else { el.addEventListener("loadedmetadata", toEnd, { once: true }); }
      } else if (paused) {
        el.pause();
      } else {
        if (restart || el.ended) { el.currentTime = 0; }
        var p = el.play();
        if (p && p.catch) { p.catch(function () {}); }
      }
    } else if (c.held) {
      clearTimer();
    } else if (restart || timer === null) {
      armTimer(c.media);
    }
  }

  function updateStatus() {
    var position = document.getElementById("position");
    var mode = document.getElementById("mode");
    var notes = document.getElementById("notes");
    if (state.ended) {
      position.textContent = "end of " + deck.name;
      mode.textContent = "";
      notes.textContent = "";
      return;
    }
    var s = slides[state.slide];
    position.textContent = (s.title ? s.title + " - " : "") +
      (state.slide + 1) + "/" + slides.length;
    mode.textContent = "[" + s.mode + (paused ? ", paused" : "") + "]";
    notes.textContent = s.notes || "";
  }

  function updateOverview() {
    Array.prototype.forEach.call(overview.children, function (item, i) {
      item.classList.toggle("current", !state.ended && i === state.slide);
    });
  }

  slides.forEach(function (s, i) {
    var item = document.createElement("button");
    item.className = "thumb";
    if (s.thumbnail) {
      var img = document.createElement("img");
      img.src = s.thumbnail.src;
      img.alt = "";
      item.appendChild(img);
    }
    var label = document.createElement("span");
    label.textContent = (i + 1) + (s.title ? ". " + s.title : "");
    item.appendChild(label);
    item.addEventListener("click", function () {
      document.body.classList.remove("show-overview");
      step(jump, i);
    });
    overview.appendChild(item);
  });

  function step(transition, arg) {
    var before = cue();
    var result = transition(arg);
    var after = cue();
    var restart = transition === mediaFinished || transition === replay || transition === jump ||
      (before && after ? before.key !== after.key : before !== after);
    show(restart);
    return result;
  }

  document.addEventListener("keydown", function (e) {
    var k = e.key;
    if (k >= "0" && k <= "9") { typed += k; return; }
    if (k === "Enter" && typed !== "") {
      step(jump, parseInt(typed, 10) - 1);
      typed = "";
      return;
    }
    typed = "";
    if (k === "ArrowRight" || k === " " || k === "PageDown" || k === "Enter") { step(advance); }
    else if (k === "ArrowLeft" || k === "PageUp" || k === "Backspace") { step(retreat); }
    else if (k === "Home") { step(jump, 0); }
    else if (k === "End") { step(jump, slides.length - 1); }
    else if (k === "r" || k === "R") { step(replay); }
    else if (k === "p" || k === "P") {
      paused = !paused;
      if (paused) { clearTimer(); }
      show(false);
    }
    else if (k === "s" || k === "S") { document.body.classList.toggle("show-status"); }
    else if (k === "g" || k === "G") { document.body.classList.toggle("show-overview"); }
    else if (k === "f" || k === "F") {
      if (document.fullscreenElement) { document.exitFullscreen(); }
      else if (document.documentElement.requestFullscreen) { document.documentElement.requestFullscreen(); }
    }
    else { return; }
    e.preventDefault();
  });
  stage.addEventListener("click", function () { step(advance); });

  var start = parseInt((location.hash || "").replace("#", ""), 10);
  if (start >= 1 && start <= slides.length) { enter(start - 1); }
  show(true);
})();
</script>
</body>
</html>
"##;

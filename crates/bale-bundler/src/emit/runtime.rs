//! The module registry shipped to the browser and the chunk wrapper format.
//!
//! Every chunk pushes `[names, factories, entries]` onto the global
//! `__bale_chunks__` queue. The prelude drains that queue, replaces its
//! `push`, registers factories, and runs an entry once every chunk it
//! requires has been pushed, so chunk scripts may load in any order.

use super::sourcemap::Mapping;
use crate::link::quote;

pub(crate) const CHUNK_QUEUE: &str = "__bale_chunks__";

/// Registry prelude. Evaluating it twice is a no-op.
pub(crate) const PRELUDE: &str = r#"(function () {
  var queue = (globalThis.__bale_chunks__ = globalThis.__bale_chunks__ || []);
  if (queue.push !== Array.prototype.push) return;
  var hasOwn = Object.prototype.hasOwnProperty;
  var factories = {};
  var cache = {};
  var loaded = {};
  var deferred = [];
  function require(key) {
    var cached = cache[key];
    if (cached !== undefined) return cached.exports;
    var factory = factories[key];
    if (factory === undefined) throw new Error("Module '" + key + "' is not registered");
    var module = (cache[key] = { exports: {} });
    factory.call(module.exports, module, module.exports, require);
    return module.exports;
  }
  require.d = function (exports, name, getter) {
    if (!hasOwn.call(exports, name)) {
      Object.defineProperty(exports, name, { enumerable: true, get: getter });
    }
  };
  require.r = function (exports) {
    Object.defineProperty(exports, "__esModule", { value: true });
  };
  require.n = function (exports) {
    return exports && exports.__esModule ? exports["default"] : exports;
  };
  require.s = function (exports, source) {
    Object.keys(source).forEach(function (name) {
      if (name !== "default" && name !== "__esModule") {
        require.d(exports, name, function () { return source[name]; });
      }
    });
  };
  require.x = function (specifier) {
    throw new Error("Cannot find module '" + specifier + "'");
  };
  function run() {
    for (var i = 0; i < deferred.length; i++) {
      var entry = deferred[i];
      var ready = true;
      for (var j = 0; j < entry[1].length; j++) {
        if (!loaded[entry[1][j]]) { ready = false; break; }
      }
      if (ready) {
        deferred.splice(i--, 1);
        require(entry[0]);
      }
    }
  }
  function push(chunk) {
    var names = chunk[0], modules = chunk[1], entries = chunk[2] || [];
    for (var key in modules) {
      if (hasOwn.call(modules, key)) factories[key] = modules[key];
    }
    for (var i = 0; i < names.length; i++) loaded[names[i]] = true;
    for (var k = 0; k < entries.length; k++) deferred.push(entries[k]);
    run();
  }
  for (var i = 0; i < queue.length; i++) push(queue[i]);
  queue.length = 0;
  queue.push = push;
})();"#;

/// A chunk's JavaScript with source mappings for its module lines.
#[derive(Debug, Default)]
pub(crate) struct ChunkSource {
    pub code: String,
    pub mappings: Vec<Mapping>,
    lines: u32,
}

impl ChunkSource {
    pub fn push_line(&mut self, text: &str) {
        if self.lines > 0 {
            self.code.push('\n');
        }
        self.code.push_str(text);
        self.lines += 1;
    }

    /// Append multi-line `text` with no origin.
    pub fn push_unmapped(&mut self, text: &str) {
        for line in text.lines() {
            self.push_line(line);
        }
    }

    pub fn open(&mut self, name: &str) {
        self.push_line(
            &format!(
                "(globalThis.{CHUNK_QUEUE} = globalThis.{CHUNK_QUEUE} || []).push([[{}], {{",
                quote(name)
            ),
        );
    }

    /// Append one module factory. Without `mappings`, line i of `code` maps
    /// to line i of the module; otherwise `mappings` are relative to `code`.
    pub fn module(&mut self, key: &str, code: &str, source: u32, mappings: Option<&[Mapping]>) {
        self.push_line(&format!(
            "{}: function (module, exports, __bale_require__) {{",
            quote(key)
        ));
        let first = self.lines;
        match mappings {
            Some(mappings) => {
                self.mappings.extend(mappings.iter().map(|mapping| Mapping {
                    generated_line: first + mapping.generated_line,
                    source,
                    ..*mapping
                }));
            }
            None => {
                let count = code.lines().count() as u32;
                self.mappings
                    .extend((0..count).map(|line| Mapping::line(first + line, source, line)));
            }
        }
        for line in code.lines() {
            self.push_line(line);
        }
        self.push_line("},");
    }

    /// Close the factory table; `entries` are `(key, required chunks)`.
    pub fn close(&mut self, entries: &[(String, Vec<String>)]) {
        let rendered: Vec<String> = entries
            .iter()
            .map(|(key, requires)| {
                let requires: Vec<String> = requires.iter().map(|name| quote(name)).collect();
                format!("[{}, [{}]]", quote(key), requires.join(", "))
            })
            .collect();
        self.push_line(&format!("}}, [{}]]);", rendered.join(", ")));
    }
}

//! The default applet set shipped with the shell.
//!
//! Each applet parses its arguments with [`argh`] and works on the real filesystem
//! through std file I/O. The dispatch core knows nothing about them beyond the
//! [`Applet`] contract.

use crate::command::Applet;
use crate::registry::{Registry, RegistryBuilder, RegistryError};
use anyhow::{Context, Result, anyhow, bail};
use argh::{EarlyExit, FromArgs};
use regex::RegexBuilder;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;

/// Applets known at compile time, parsed with [`argh`].
pub(crate) trait BuiltinApplet: Sized + FromArgs {
    /// Canonical name of the applet, e.g. "echo" or "wc".
    fn name() -> &'static str;

    /// Executes the applet, writing its output to `stdout`.
    fn execute(self, stdout: &mut dyn Write) -> Result<()>;
}

/// Adapter turning a [`BuiltinApplet`] type into a registrable [`Applet`].
struct Builtin<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Default for Builtin<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinApplet> Applet for Builtin<T> {
    fn invoke(&self, stdout: &mut dyn Write, args: &[String]) -> Result<()> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match T::from_args(&[T::name()], &args) {
            Ok(cmd) => cmd.execute(stdout),
            // --help
            Err(EarlyExit {
                output,
                status: Ok(()),
            }) => {
                stdout.write_all(output.as_bytes())?;
                Ok(())
            }
            Err(EarlyExit {
                output,
                status: Err(()),
            }) => Err(anyhow!("{}", output.trim_end())),
        }
    }
}

fn register<T: BuiltinApplet + 'static>(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder.register(T::name(), Builtin::<T>::default())?;
    Ok(())
}

/// Build a registry holding every applet in this module.
pub fn default_registry() -> Result<Registry, RegistryError> {
    let mut builder = Registry::builder();
    register::<Basename>(&mut builder)?;
    register::<Cat>(&mut builder)?;
    register::<Dirname>(&mut builder)?;
    register::<Echo>(&mut builder)?;
    register::<Grep>(&mut builder)?;
    register::<Head>(&mut builder)?;
    register::<Ls>(&mut builder)?;
    register::<Mkdir>(&mut builder)?;
    register::<Rm>(&mut builder)?;
    register::<Rmdir>(&mut builder)?;
    register::<Seq>(&mut builder)?;
    register::<Sleep>(&mut builder)?;
    register::<WC>(&mut builder)?;
    Ok(builder.build())
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinApplet for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, stdout: &mut dyn Write) -> Result<()> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// print file(s) to stdout
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to concatenate.
    pub files: Vec<String>,
}

impl BuiltinApplet for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(self, stdout: &mut dyn Write) -> Result<()> {
        if self.files.is_empty() {
            bail!("cat: missing file operand");
        }
        for fname in self.files {
            let mut f = fs::File::open(&fname).with_context(|| format!("cat: {}", fname))?;
            std::io::copy(&mut f, stdout)?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// count lines, words and bytes
pub struct WC {
    #[argh(positional, greedy)]
    /// files to count.
    pub files: Vec<String>,
}

impl BuiltinApplet for WC {
    fn name() -> &'static str {
        "wc"
    }

    fn execute(self, stdout: &mut dyn Write) -> Result<()> {
        if self.files.is_empty() {
            bail!("wc: missing file operand");
        }
        let (mut total_lines, mut total_words, mut total_bytes) = (0, 0, 0);
        for fname in &self.files {
            let mut f = fs::File::open(fname).with_context(|| format!("wc: {}", fname))?;
            let mut data = Vec::new();
            f.read_to_end(&mut data)
                .with_context(|| format!("wc: {}", fname))?;
            let (lines, words, bytes) = wc_counts(&data);
            writeln!(stdout, "{} {} {} {}", lines, words, bytes, fname)?;
            total_lines += lines;
            total_words += words;
            total_bytes += bytes;
        }
        if self.files.len() > 1 {
            writeln!(stdout, "{} {} {} total", total_lines, total_words, total_bytes)?;
        }
        Ok(())
    }
}

/// Lines, words and bytes of raw file contents. A final line without a trailing
/// newline still counts as a line.
fn wc_counts(data: &[u8]) -> (usize, usize, usize) {
    let newlines = data.iter().filter(|&&b| b == b'\n').count();
    let lines = match data.last() {
        Some(&last) if last != b'\n' => newlines + 1,
        _ => newlines,
    };
    let words = data
        .split(|b| b.is_ascii_whitespace())
        .filter(|word| !word.is_empty())
        .count();
    (lines, words, data.len())
}

#[derive(FromArgs)]
/// output the first part of files
pub struct Head {
    #[argh(option, short = 'n', default = "10")]
    /// number of lines to print per file
    pub lines: usize,

    #[argh(positional, greedy)]
    /// files to read.
    pub files: Vec<String>,
}

impl BuiltinApplet for Head {
    fn name() -> &'static str {
        "head"
    }

    fn execute(self, stdout: &mut dyn Write) -> Result<()> {
        if self.files.is_empty() {
            bail!("head: missing file operand");
        }
        let with_headers = self.files.len() > 1;
        for (i, fname) in self.files.iter().enumerate() {
            let f = fs::File::open(fname).with_context(|| format!("head: {}", fname))?;
            if with_headers {
                if i > 0 {
                    writeln!(stdout)?;
                }
                writeln!(stdout, "==> {} <==", fname)?;
            }
            for line in BufReader::new(f).lines().take(self.lines) {
                let line = line.with_context(|| format!("head: {}", fname))?;
                writeln!(stdout, "{}", line)?;
            }
        }
        Ok(())
    }
}

#[derive(argh::FromArgs)]
/// print lines matching a pattern
pub struct Grep {
    #[argh(positional)]
    /// the pattern to search for (a regular expression)
    pub pattern: String,

    #[argh(positional, greedy)]
    /// files to search.
    pub files: Vec<String>,

    #[argh(switch, short = 'w')]
    /// match only whole words (using non-word characters as boundaries)
    pub word_regexp: bool,

    #[argh(switch, short = 'i')]
    /// ignore case distinctions
    pub ignore_case: bool,

    #[argh(option, short = 'A', default = "0")]
    /// print NUM lines of trailing context after matching lines
    pub after_context: usize,
}

impl Grep {
    fn process_source(
        &self,
        reader: &mut dyn Read,
        stdout: &mut dyn Write,
        file_name: Option<&str>,
        re: &regex::Regex,
    ) -> Result<()> {
        let lines = BufReader::new(reader)
            .lines()
            .collect::<std::io::Result<Vec<String>>>()?;

        let mut to_print = vec![false; lines.len()];
        for (i, line) in lines.iter().enumerate() {
            if re.is_match(line) {
                let end = (i + self.after_context + 1).min(lines.len());
                to_print[i..end].iter_mut().for_each(|p| *p = true);
            }
        }

        let prefix = file_name
            .map(|name| format!("{}:", name))
            .unwrap_or_default();
        let mut last_printed: Option<usize> = None;

        for (i, line) in lines.iter().enumerate() {
            if !to_print[i] {
                continue;
            }
            if self.after_context > 0 && last_printed.is_some_and(|last| i > last + 1) {
                writeln!(stdout, "--")?;
            }
            writeln!(stdout, "{}{}", prefix, line)?;
            last_printed = Some(i);
        }

        Ok(())
    }
}

impl BuiltinApplet for Grep {
    fn name() -> &'static str {
        "grep"
    }

    fn execute(self, stdout: &mut dyn Write) -> Result<()> {
        if self.files.is_empty() {
            bail!("grep: missing file operand");
        }

        let pattern = if self.word_regexp {
            format!(r"\b({})\b", self.pattern)
        } else {
            self.pattern.clone()
        };
        let re = RegexBuilder::new(&pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .with_context(|| format!("grep: invalid regex pattern: {}", pattern))?;

        let prefix_names = self.files.len() > 1;
        let mut failed = Vec::new();
        for file_name in &self.files {
            let result = fs::File::open(file_name)
                .map_err(anyhow::Error::from)
                .and_then(|mut f| {
                    let name = prefix_names.then_some(file_name.as_str());
                    self.process_source(&mut f, stdout, name, &re)
                });
            if let Err(e) = result {
                failed.push(format!("{}: {}", file_name, e));
            }
        }
        if !failed.is_empty() {
            bail!("grep: {}", failed.join("; "));
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// strip directory and suffix from a file name
pub struct Basename {
    #[argh(positional)]
    /// the path to strip.
    pub path: String,

    #[argh(positional)]
    /// optional suffix to remove.
    pub suffix: Option<String>,
}

impl BuiltinApplet for Basename {
    fn name() -> &'static str {
        "basename"
    }

    fn execute(self, stdout: &mut dyn Write) -> Result<()> {
        let trimmed = self.path.trim_end_matches('/');
        let mut base = if trimmed.is_empty() && !self.path.is_empty() {
            "/"
        } else {
            trimmed.rsplit('/').next().unwrap_or(trimmed)
        };
        if let Some(suffix) = self.suffix.as_deref() {
            if base != suffix {
                base = base.strip_suffix(suffix).unwrap_or(base);
            }
        }
        writeln!(stdout, "{}", base)?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// strip the last component from a file name
pub struct Dirname {
    #[argh(positional)]
    /// the path to strip.
    pub path: String,
}

impl BuiltinApplet for Dirname {
    fn name() -> &'static str {
        "dirname"
    }

    fn execute(self, stdout: &mut dyn Write) -> Result<()> {
        let trimmed = self.path.trim_end_matches('/');
        let dir = match trimmed.rfind('/') {
            None if self.path.starts_with('/') => "/",
            None => ".",
            Some(idx) => match trimmed[..idx].trim_end_matches('/') {
                "" => "/",
                dir => dir,
            },
        };
        writeln!(stdout, "{}", dir)?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// list directory contents
pub struct Ls {
    #[argh(switch, short = 'a')]
    /// do not ignore entries starting with '.'
    pub all: bool,

    #[argh(positional, greedy)]
    /// directories or files to list; the current directory when omitted.
    pub paths: Vec<String>,
}

impl Ls {
    fn list_dir(&self, dir: &Path, stdout: &mut dyn Write) -> Result<()> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("ls: {}", dir.display()))? {
            let entry = entry?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') && !self.all {
                continue;
            }
            if entry.file_type()?.is_dir() {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        for name in names {
            writeln!(stdout, "{}", name)?;
        }
        Ok(())
    }
}

impl BuiltinApplet for Ls {
    fn name() -> &'static str {
        "ls"
    }

    fn execute(self, stdout: &mut dyn Write) -> Result<()> {
        let paths = if self.paths.is_empty() {
            vec![".".to_string()]
        } else {
            self.paths.clone()
        };
        let with_headers = paths.len() > 1;
        for (i, path) in paths.iter().enumerate() {
            let meta = fs::metadata(path).with_context(|| format!("ls: {}", path))?;
            if !meta.is_dir() {
                writeln!(stdout, "{}", path)?;
                continue;
            }
            if with_headers {
                if i > 0 {
                    writeln!(stdout)?;
                }
                writeln!(stdout, "{}:", path)?;
            }
            self.list_dir(Path::new(path), stdout)?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// create directories
pub struct Mkdir {
    #[argh(switch, short = 'p')]
    /// create parent directories as needed, no error if existing
    pub parents: bool,

    #[argh(positional, greedy)]
    /// directories to create.
    pub dirs: Vec<String>,
}

impl BuiltinApplet for Mkdir {
    fn name() -> &'static str {
        "mkdir"
    }

    fn execute(self, _stdout: &mut dyn Write) -> Result<()> {
        if self.dirs.is_empty() {
            bail!("mkdir: missing operand");
        }
        for dir in &self.dirs {
            let result = if self.parents {
                fs::create_dir_all(dir)
            } else {
                fs::create_dir(dir)
            };
            result.with_context(|| format!("mkdir: {}", dir))?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// remove files or directories
pub struct Rm {
    #[argh(switch, short = 'r')]
    /// remove directories and their contents recursively
    pub recursive: bool,

    #[argh(switch, short = 'f')]
    /// ignore nonexistent files
    pub force: bool,

    #[argh(positional, greedy)]
    /// paths to remove.
    pub paths: Vec<String>,
}

impl BuiltinApplet for Rm {
    fn name() -> &'static str {
        "rm"
    }

    fn execute(self, _stdout: &mut dyn Write) -> Result<()> {
        if self.paths.is_empty() && !self.force {
            bail!("rm: missing operand");
        }
        for path in &self.paths {
            let meta = match fs::symlink_metadata(path) {
                Ok(meta) => meta,
                Err(e) if self.force && e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("rm: {}", path)),
            };
            let result = if meta.is_dir() {
                if !self.recursive {
                    bail!("rm: {}: is a directory", path);
                }
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            result.with_context(|| format!("rm: {}", path))?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// remove empty directories
pub struct Rmdir {
    #[argh(positional, greedy)]
    /// directories to remove.
    pub dirs: Vec<String>,
}

impl BuiltinApplet for Rmdir {
    fn name() -> &'static str {
        "rmdir"
    }

    fn execute(self, _stdout: &mut dyn Write) -> Result<()> {
        if self.dirs.is_empty() {
            bail!("rmdir: missing operand");
        }
        for dir in &self.dirs {
            fs::remove_dir(dir).with_context(|| format!("rmdir: {}", dir))?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// print a sequence of numbers: seq LAST, seq FIRST LAST or seq FIRST INCREMENT LAST
pub struct Seq {
    #[argh(positional, greedy)]
    /// one to three integers.
    pub numbers: Vec<String>,
}

impl BuiltinApplet for Seq {
    fn name() -> &'static str {
        "seq"
    }

    fn execute(self, stdout: &mut dyn Write) -> Result<()> {
        let numbers = self
            .numbers
            .iter()
            .map(|n| {
                n.parse::<i64>()
                    .with_context(|| format!("seq: invalid number: {}", n))
            })
            .collect::<Result<Vec<i64>>>()?;
        let (first, step, last) = match numbers.as_slice() {
            [last] => (1, 1, *last),
            [first, last] => (*first, 1, *last),
            [first, step, last] => (*first, *step, *last),
            _ => bail!("seq: expected 1 to 3 numbers, got {}", numbers.len()),
        };
        if step == 0 {
            bail!("seq: increment must not be zero");
        }
        let mut current = first;
        while (step > 0 && current <= last) || (step < 0 && current >= last) {
            writeln!(stdout, "{}", current)?;
            current = match current.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// delay for a number of seconds
pub struct Sleep {
    #[argh(positional)]
    /// seconds to sleep, fractions allowed.
    pub seconds: f64,
}

impl BuiltinApplet for Sleep {
    fn name() -> &'static str {
        "sleep"
    }

    fn execute(self, _stdout: &mut dyn Write) -> Result<()> {
        let duration = Duration::try_from_secs_f64(self.seconds)
            .map_err(|e| anyhow!("sleep: invalid time interval {}: {}", self.seconds, e))?;
        std::thread::sleep(duration);
        Ok(())
    }
}

use std::io::{self, SeekFrom, Write};

use clap::Parser;
use itertools::Itertools;

use crate::vfs::fs::{InodeKind, OpenMode};
use crate::vfs::kernel::{Errno, Vfs};

pub type Args = Vec<String>;
pub type Status = u8;

pub const EXIT_SUCCESS: Status = 0;
pub const EXIT_FAILURE: Status = 1;
pub const EXIT_ENOENT: Status = 127;

fn fail(out: &mut dyn Write, binary: &str, errno: &Errno) -> io::Result<Status> {
  writeln!(out, "{binary}: {errno}")?;
  Ok(match errno {
    Errno::NoSuchFile(_) | Errno::NoSuchDirectory(_) => EXIT_ENOENT,
    _ => EXIT_FAILURE,
  })
}

/// Run one shell line. Unknown commands exit with 127.
pub fn exec(line: &str, vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  let args: Args = line.split_whitespace().map(str::to_owned).collect();

  let binary: fn(&[String], &mut Vfs, &mut dyn Write) -> io::Result<Status> = match args.first().map(String::as_str) {
    None => return Ok(EXIT_SUCCESS),
    Some("ls") => ls,
    Some("cd") => cd,
    Some("pwd") => pwd,
    Some("cat") => cat,
    Some("mkdir") => mkdir,
    Some("touch") => touch,
    Some("write") => write,
    Some("ln") => ln,
    Some("readlink") => readlink,
    Some("sync") => sync,
    Some("echo") => echo,
    Some(unknown) => {
      writeln!(out, "{unknown}: command not found")?;
      return Ok(EXIT_ENOENT);
    },
  };

  binary(&args, vfs, out)
}

// FS reading stuff

pub fn ls(args: &[String], vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  #[derive(Debug, Parser)]
  struct BinArgs {
    #[clap(short, long)]
    long: bool,
    pathname: Option<String>,
  }

  let BinArgs { long, pathname } = match BinArgs::try_parse_from(args.iter()) {
    Ok(bin_args) => bin_args,
    Err(message) => {
      writeln!(out, "ls: invalid arguments: {message}")?;
      return Ok(EXIT_FAILURE);
    },
  };

  let entries = match vfs.ls(pathname.as_deref()) {
    Ok(entries) => entries,
    Err(errno) => return fail(out, "ls", &errno),
  };

  for entry in entries {
    if !long {
      writeln!(out, "{}", entry.name)?;
      continue;
    }

    let inode = match vfs.inode(entry.number) {
      Ok(inode) => inode,
      Err(errno) => return fail(out, "ls", &errno),
    };
    write!(
      out,
      "{}{}\t{}\t{} {}\t{}\t{}",
      entry.kind.as_char(),
      inode.mode,
      inode.links_count,
      inode.uid,
      inode.gid,
      inode.size(),
      entry.name,
    )?;
    if let InodeKind::Symlink { target } = &inode.kind {
      write!(out, " -> {target}")?;
    }
    writeln!(out)?;
  }

  Ok(EXIT_SUCCESS)
}

pub fn pwd(_args: &[String], vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  match vfs.current_path() {
    Ok(pathname) => {
      writeln!(out, "{pathname}")?;
      Ok(EXIT_SUCCESS)
    },
    Err(errno) => fail(out, "pwd", &errno),
  }
}

pub fn cat(args: &[String], vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  if args.len() < 2 {
    writeln!(out, "cat: no files to concatenate")?;
    return Ok(EXIT_FAILURE);
  }

  let mut concatenated_bytes = Vec::new();

  for pathname in &args[1..] {
    match vfs.cat(pathname) {
      Ok(mut bytes) => concatenated_bytes.append(&mut bytes),
      Err(errno) => return fail(out, "cat", &errno),
    }
  }

  match std::str::from_utf8(&concatenated_bytes) {
    Ok(utf8_string) => {
      write!(out, "{utf8_string}")?;
      Ok(EXIT_SUCCESS)
    },
    Err(utf8error) => {
      writeln!(out, "cat: can't parse utf8: {utf8error}")?;
      Ok(EXIT_FAILURE)
    },
  }
}

pub fn readlink(args: &[String], vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  #[derive(Debug, Parser)]
  struct BinArgs {
    pathname: String,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      writeln!(out, "readlink: invalid arguments: {message}")?;
      Ok(EXIT_FAILURE)
    },
    Ok(BinArgs { pathname }) => match vfs.readlink(&pathname) {
      Ok(target) => {
        writeln!(out, "{target}")?;
        Ok(EXIT_SUCCESS)
      },
      Err(errno) => fail(out, "readlink", &errno),
    },
  }
}

// FS writing stuff

pub fn cd(args: &[String], vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  let pathname = args.get(1).map(String::as_str).unwrap_or("/");

  match vfs.cd(pathname) {
    Ok(()) => Ok(EXIT_SUCCESS),
    Err(errno) => fail(out, "cd", &errno),
  }
}

pub fn mkdir(args: &[String], vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  #[derive(Debug, Parser)]
  struct BinArgs {
    #[clap(required = true)]
    pathnames: Vec<String>,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      writeln!(out, "mkdir: invalid arguments: {message}")?;
      Ok(EXIT_FAILURE)
    },
    Ok(BinArgs { pathnames }) => {
      for pathname in pathnames {
        if let Err(errno) = vfs.mkdir(&pathname) {
          return fail(out, "mkdir: cannot create directory", &errno);
        }
      }
      Ok(EXIT_SUCCESS)
    },
  }
}

pub fn touch(args: &[String], vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  #[derive(Debug, Parser)]
  struct BinArgs {
    #[clap(required = true)]
    pathnames: Vec<String>,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      writeln!(out, "touch: invalid arguments: {message}")?;
      Ok(EXIT_FAILURE)
    },
    Ok(BinArgs { pathnames }) => {
      for pathname in pathnames {
        if let Err(errno) = vfs.touch(&pathname) {
          return fail(out, "touch: cannot touch", &errno);
        }
      }
      Ok(EXIT_SUCCESS)
    },
  }
}

/// `write <pathname> <text>...` appends a line, creating the file
pub fn write(args: &[String], vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  #[derive(Debug, Parser)]
  struct BinArgs {
    pathname: String,
    #[clap(required = true)]
    text: Vec<String>,
  }

  let BinArgs { pathname, text } = match BinArgs::try_parse_from(args.iter()) {
    Ok(bin_args) => bin_args,
    Err(message) => {
      writeln!(out, "write: invalid arguments: {message}")?;
      return Ok(EXIT_FAILURE);
    },
  };

  let line = format!("{}\n", text.iter().join(" "));
  let written = vfs.open(&pathname, OpenMode::Write).and_then(|fd| {
    let result = vfs
      .seek(fd, SeekFrom::End(0))
      .and_then(|_| vfs.write(fd, line.as_bytes()));
    vfs.close(fd)?;
    result
  });

  match written {
    Ok(_) => Ok(EXIT_SUCCESS),
    Err(errno) => fail(out, "write", &errno),
  }
}

pub fn ln(args: &[String], vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  #[derive(Debug, Parser)]
  struct BinArgs {
    #[clap(short, long)]
    symbolic: bool,
    target: String,
    linkpath: String,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      writeln!(out, "ln: invalid arguments: {message}")?;
      Ok(EXIT_FAILURE)
    },
    Ok(BinArgs { symbolic: false, .. }) => {
      writeln!(out, "ln: hard links are not supported, use -s")?;
      Ok(EXIT_FAILURE)
    },
    Ok(BinArgs { target, linkpath, .. }) => match vfs.symlink(&target, &linkpath) {
      Ok(_) => Ok(EXIT_SUCCESS),
      Err(errno) => fail(out, "ln", &errno),
    },
  }
}

pub fn sync(_args: &[String], vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  match vfs.sync() {
    Ok(()) => Ok(EXIT_SUCCESS),
    Err(errno) => fail(out, "sync", &errno),
  }
}

pub fn echo(args: &[String], _vfs: &mut Vfs, out: &mut dyn Write) -> io::Result<Status> {
  writeln!(out, "{}", args.iter().skip(1).join(" "))?;
  Ok(EXIT_SUCCESS)
}


// vim:ts=2 sw=2

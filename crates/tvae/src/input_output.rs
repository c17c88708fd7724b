use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter},
};

fn squash_standard_io(path: &Option<String>) -> Option<String> {
    match path {
        Some(p) if p == "-" => None,
        Some(p) => Some(p.clone()),
        None => None,
    }
}

/// Input argument group; one text per line.
#[derive(clap::Args, Debug)]
pub struct InputArgs {
    /// Optional input file; "-" may be used to indicate stdin.
    #[clap(long, default_value = None)]
    pub input: Option<String>,
}

impl InputArgs {
    /// Open a reader for the input.
    pub fn open_reader(&self) -> Result<Box<dyn BufRead>, Box<dyn std::error::Error>> {
        Ok(match squash_standard_io(&self.input) {
            None => Box::new(BufReader::new(std::io::stdin().lock())),
            Some(p) => Box::new(BufReader::new(File::open(p)?)),
        })
    }

    /// Read every input text.
    pub fn read_texts(&self) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        read_lines(self.open_reader()?)
    }
}

/// Output argument group.
#[derive(clap::Args, Debug)]
pub struct OutputArgs {
    /// Optional output file; "-" may be used to indicate stdout.
    #[clap(long, default_value = None)]
    pub output: Option<String>,
}

impl OutputArgs {
    /// Open a writer for the output.
    pub fn open_writer(&self) -> Result<Box<dyn std::io::Write>, Box<dyn std::error::Error>> {
        Ok(match squash_standard_io(&self.output) {
            Some(p) => Box::new(BufWriter::new(File::create(p)?)),
            None => Box::new(BufWriter::new(std::io::stdout().lock())),
        })
    }
}

/// Read a text file, one text per line.
pub fn read_text_file(path: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    read_lines(BufReader::new(File::open(path)?))
}

fn read_lines<R: BufRead>(reader: R) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    Ok(reader.lines().collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_read_lines() {
        let lines = read_lines("the cat\n\na dog\n".as_bytes()).unwrap();
        assert_eq!(lines, vec!["the cat", "", "a dog"]);
    }

    #[test]
    fn test_squash_standard_io() {
        assert_eq!(squash_standard_io(&Some("-".to_string())), None);
        assert_eq!(squash_standard_io(&None), None);
        assert_eq!(
            squash_standard_io(&Some("texts.txt".to_string())),
            Some("texts.txt".to_string())
        );
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir::TempDir::new("tvae-io").unwrap();
        let path = dir.path().join("texts.txt");
        let path = path.to_str().unwrap().to_string();

        let output = OutputArgs {
            output: Some(path.clone()),
        };
        let mut writer = output.open_writer().unwrap();
        writeln!(writer, "one").unwrap();
        writeln!(writer, "two words").unwrap();
        writer.flush().unwrap();
        drop(writer);

        let input = InputArgs { input: Some(path) };
        assert_eq!(input.read_texts().unwrap(), vec!["one", "two words"]);
    }
}

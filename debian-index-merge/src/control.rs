// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Control file primitives.

`Packages` and `Sources` index files are *control files*: sequences of
paragraphs separated by blank lines, each paragraph an ordered series of
`Key: Value` fields. Indented lines continue the value of the preceding
field and are preserved verbatim.

See <https://www.debian.org/doc/debian-policy/ch-controlfields.html> for the
canonical definition.
*/

use {
    crate::error::{MergeError, Result},
    std::io::{BufRead, Write},
};

/// A field in a control file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControlField {
    name: String,
    value: String,
}

impl ControlField {
    /// Construct an instance from a field name and value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The name of this field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Obtain the value as a [&str].
    ///
    /// The value's original formatting, including embedded newlines and the
    /// leading whitespace of continuation lines, is included.
    pub fn value_str(&self) -> &str {
        &self.value
    }

    /// Write the contents of this field to a writer.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(b": ")?;
        writer.write_all(self.value.as_bytes())?;
        writer.write_all(b"\n")
    }
}

/// A paragraph in a control file.
///
/// A paragraph is an ordered series of control fields. Field names are case
/// insensitive on read and case preserving on set. A paragraph can only
/// contain a single occurrence of a field; setting an existing field replaces
/// its value in place, preserving field order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ControlParagraph {
    fields: Vec<ControlField>,
}

impl ControlParagraph {
    /// Whether the paragraph has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set the value of a field.
    ///
    /// If a field with the same name (case insensitive compare) already
    /// exists, its value is replaced without disturbing field order.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        if let Some(existing) = self
            .fields
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(&name))
        {
            existing.value = value;
        } else {
            self.fields.push(ControlField::new(name, value));
        }
    }

    /// Whether a named field is present in this paragraph.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Obtain the field with a given name in this paragraph.
    pub fn field(&self, name: &str) -> Option<&ControlField> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Obtain the raw string value of the named field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value_str())
    }

    /// Obtain the raw string value of a field that must be present.
    pub fn required_field_str(&self, name: &'static str) -> Result<&str> {
        self.field_str(name)
            .ok_or(MergeError::ControlRequiredFieldMissing(name))
    }

    /// Iterate over fields in this paragraph in insertion order.
    pub fn iter_fields(&self) -> impl Iterator<Item = &ControlField> {
        self.fields.iter()
    }

    /// Serialize the paragraph to a writer.
    ///
    /// A trailing newline is written as part of the final field. The blank
    /// line separating paragraphs is not emitted.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for field in &self.fields {
            field.write(writer)?;
        }

        Ok(())
    }
}

/// Holds parsing state for control files.
///
/// Instances are fed lines of text and emit [ControlParagraph] instances as
/// they are completed.
#[derive(Clone, Debug, Default)]
pub struct ControlFileParser {
    paragraph: ControlParagraph,
    field: Option<String>,
}

impl ControlFileParser {
    /// Write a line to the parser.
    ///
    /// If the line terminates an in-progress paragraph, that paragraph is
    /// returned. Otherwise `Ok(None)` is returned.
    pub fn write_line(&mut self, line: &str) -> Result<Option<ControlParagraph>> {
        let is_empty_line = line.trim().is_empty();
        let is_continuation = line.starts_with(' ') || line.starts_with('\t');

        // A blank line finishes the current paragraph.
        if is_empty_line {
            if let Some(field) = self.field.take() {
                self.flush_field(field)?;
            }

            return Ok(if self.paragraph.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.paragraph))
            });
        }

        match self.field.take() {
            // Continuation of the field on the stack. Accumulate the raw
            // line, preserving its leading whitespace.
            Some(pending) if is_continuation => {
                self.field = Some(pending + line);
                Ok(None)
            }
            // An unindented line begins a new field; flush the previous one.
            Some(pending) => {
                self.flush_field(pending)?;
                self.field = Some(line.to_string());
                Ok(None)
            }
            None if is_continuation => Err(MergeError::ControlParse(format!(
                "continuation line without a preceding field: {}",
                line.trim_end()
            ))),
            None => {
                self.field = Some(line.to_string());
                Ok(None)
            }
        }
    }

    /// Finish parsing, consuming self.
    ///
    /// Returns the final paragraph if unflushed state remains.
    pub fn finish(mut self) -> Result<Option<ControlParagraph>> {
        if let Some(field) = self.field.take() {
            self.flush_field(field)?;
        }

        Ok(if self.paragraph.is_empty() {
            None
        } else {
            Some(self.paragraph)
        })
    }

    fn flush_field(&mut self, raw: String) -> Result<()> {
        let (name, value) = raw.split_once(':').ok_or_else(|| {
            MergeError::ControlParse(format!(
                "field line is missing a colon: {}",
                raw.trim_end()
            ))
        })?;

        self.paragraph.set_field(name.to_string(), value.trim().to_string());

        Ok(())
    }
}

/// A streaming reader of [ControlParagraph].
///
/// Instances are bound to a [BufRead] and can be consumed as an iterator,
/// yielding one complete paragraph per item.
pub struct ControlParagraphReader<R: BufRead> {
    reader: R,
    parser: Option<ControlFileParser>,
}

impl<R: BufRead> ControlParagraphReader<R> {
    /// Create a new instance bound to a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: Some(ControlFileParser::default()),
        }
    }

    fn get_next(&mut self, mut parser: ControlFileParser) -> Result<Option<ControlParagraph>> {
        loop {
            let mut line = String::new();

            if self.reader.read_line(&mut line)? == 0 {
                return parser.finish();
            }

            if let Some(paragraph) = parser.write_line(&line)? {
                self.parser.replace(parser);
                return Ok(Some(paragraph));
            }
        }
    }
}

impl<R: BufRead> Iterator for ControlParagraphReader<R> {
    type Item = Result<ControlParagraph>;

    fn next(&mut self) -> Option<Self::Item> {
        let parser = self.parser.take()?;

        match self.get_next(parser) {
            Ok(Some(paragraph)) => Some(Ok(paragraph)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, indoc::indoc};

    #[test]
    fn field_set_semantics() {
        let mut p = ControlParagraph::default();

        p.set_field("Package", "grub2");
        p.set_field("Version", "1.0");
        p.set_field("package", "eudev");

        // Case-insensitive replacement preserves position and casing of the
        // original field.
        assert_eq!(p.field_str("Package"), Some("eudev"));
        assert_eq!(
            p.iter_fields().map(|f| f.name()).collect::<Vec<_>>(),
            vec!["Package", "Version"]
        );
    }

    #[test]
    fn parse_simple_paragraphs() -> Result<()> {
        let text = indoc! {"
            Package: base-files
            Version: 11.1
            Architecture: amd64

            Package: eudev
            Version: 3.2.9-1
        "};

        let paragraphs = ControlParagraphReader::new(std::io::Cursor::new(text))
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].field_str("Package"), Some("base-files"));
        assert_eq!(paragraphs[0].field_str("version"), Some("11.1"));
        assert_eq!(paragraphs[1].field_str("Package"), Some("eudev"));
        assert!(!paragraphs[1].has_field("Architecture"));

        Ok(())
    }

    #[test]
    fn continuation_lines_round_trip() -> Result<()> {
        let text = indoc! {"
            Package: base-files
            Description: base system files
             This package contains the basic filesystem hierarchy.
             .
             Do not remove it.
            SHA256: abc123
        "};

        let paragraphs = ControlParagraphReader::new(std::io::Cursor::new(text))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(paragraphs.len(), 1);

        let description = paragraphs[0].field_str("Description").unwrap();
        assert_eq!(
            description,
            "base system files\n This package contains the basic filesystem hierarchy.\n .\n Do not remove it."
        );

        let mut out = Vec::new();
        paragraphs[0].write(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), text);

        Ok(())
    }

    #[test]
    fn missing_colon_is_an_error() {
        let mut parser = ControlFileParser::default();
        parser.write_line("Package: ok\n").unwrap();
        parser.write_line("garbage without separator\n").unwrap();

        assert!(matches!(
            parser.write_line("\n"),
            Err(MergeError::ControlParse(_))
        ));
    }

    #[test]
    fn stray_continuation_is_an_error() {
        let mut parser = ControlFileParser::default();

        assert!(matches!(
            parser.write_line(" indented first line\n"),
            Err(MergeError::ControlParse(_))
        ));
    }

    #[test]
    fn required_field_access() {
        let mut p = ControlParagraph::default();
        p.set_field("Package", "dash");

        assert_eq!(p.required_field_str("Package").unwrap(), "dash");
        assert!(matches!(
            p.required_field_str("Version"),
            Err(MergeError::ControlRequiredFieldMissing("Version"))
        ));
    }
}

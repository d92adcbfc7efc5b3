/// How Xcode classifies a file: the `lastKnownFileType` it writes and whether the file belongs
/// in the sources build phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileType {
    pub last_known: &'static str,
    pub compiles: bool,
}

impl FileType {
    const fn source(last_known: &'static str) -> Self {
        Self {
            last_known,
            compiles: true,
        }
    }

    const fn resource(last_known: &'static str) -> Self {
        Self {
            last_known,
            compiles: false,
        }
    }
}

/// Classify by extension (case-insensitive). Unknown extensions are plain text, not compiled.
pub fn classify(file_name: &str) -> FileType {
    let ext = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    };

    match ext.as_str() {
        "swift" => FileType::source("sourcecode.swift"),
        "m" => FileType::source("sourcecode.c.objc"),
        "mm" => FileType::source("sourcecode.cpp.objcpp"),
        "c" => FileType::source("sourcecode.c.c"),
        "cc" | "cpp" | "cxx" => FileType::source("sourcecode.cpp.cpp"),
        "metal" => FileType::source("sourcecode.metal"),
        "xcdatamodeld" => FileType::source("wrapper.xcdatamodeld"),
        "h" => FileType::resource("sourcecode.c.h"),
        "hpp" => FileType::resource("sourcecode.cpp.h"),
        "plist" => FileType::resource("text.plist.xml"),
        "json" => FileType::resource("text.json"),
        "strings" => FileType::resource("text.plist.strings"),
        "storyboard" => FileType::resource("file.storyboard"),
        "xib" => FileType::resource("file.xib"),
        "xcassets" => FileType::resource("folder.assetcatalog"),
        "entitlements" => FileType::resource("text.plist.entitlements"),
        "md" => FileType::resource("net.daringfireball.markdown"),
        "png" => FileType::resource("image.png"),
        _ => FileType::resource("text"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swift_sources_compile() {
        let ft = classify("GradientButton.swift");
        assert_eq!(ft.last_known, "sourcecode.swift");
        assert!(ft.compiles);
    }

    #[test]
    fn headers_and_resources_do_not_compile() {
        assert!(!classify("Bridging-Header.h").compiles);
        assert_eq!(classify("Info.plist").last_known, "text.plist.xml");
        assert_eq!(classify("Assets.xcassets").last_known, "folder.assetcatalog");
    }

    #[test]
    fn extension_match_ignores_case() {
        assert_eq!(classify("Legacy.M").last_known, "sourcecode.c.objc");
    }

    #[test]
    fn unknown_and_dotfiles_are_text() {
        assert_eq!(classify("README").last_known, "text");
        assert_eq!(classify(".swift").last_known, "text");
    }
}

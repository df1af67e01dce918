//! Static catalog of starter templates offered to the model.

/// Key used whenever the model's choice is not a catalog key.
pub const DEFAULT_TEMPLATE: &str = "vite-react";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Upstream starter a real fetcher would clone.
    pub reference_url: &'static str,
}

pub const CATALOG: &[Template] = &[
    Template {
        key: "expo-app",
        name: "Expo App",
        description: "Cross-platform mobile app development",
        reference_url: "https://github.com/expo/expo/tree/main/templates/expo-template-blank-typescript",
    },
    Template {
        key: "basic-astro",
        name: "Basic Astro",
        description: "Static website generation",
        reference_url: "https://github.com/withastro/astro/tree/main/examples/basics",
    },
    Template {
        key: "nextjs-shadcn",
        name: "NextJS Shadcn",
        description: "Full-stack Next.js with shadcn/ui components",
        reference_url: "https://github.com/shadcn-ui/next-template",
    },
    Template {
        key: "vite-react",
        name: "Vite React",
        description: "React with TypeScript",
        reference_url: "https://github.com/vitejs/vite/tree/main/packages/create-vite/template-react-ts",
    },
    Template {
        key: "vite-typescript",
        name: "Vite TypeScript",
        description: "Type-safe development",
        reference_url: "https://github.com/vitejs/vite/tree/main/packages/create-vite/template-vanilla-ts",
    },
    Template {
        key: "vuejs",
        name: "Vue.js",
        description: "Vue applications",
        reference_url: "https://github.com/vuejs/create-vue",
    },
];

pub fn find_template(key: &str) -> Option<&'static Template> {
    CATALOG.iter().find(|t| t.key == key)
}

pub fn default_template() -> &'static Template {
    find_template(DEFAULT_TEMPLATE).unwrap_or(&CATALOG[0])
}

/// Map a raw model reply onto a catalog entry.
///
/// The reply is trimmed and lower-cased and must then equal a key exactly;
/// anything else (prose, quotes, unknown keys) resolves to the default.
pub fn resolve_template(reply: &str) -> &'static Template {
    let key = reply.trim().to_lowercase();
    find_template(&key).unwrap_or_else(default_template)
}

/// One `- key: description` line per entry, in catalog order.
pub fn catalog_listing() -> String {
    CATALOG
        .iter()
        .map(|t| format!("- {}: {}", t.key, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

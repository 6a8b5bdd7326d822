pub mod ingredient_llm;
pub mod routine_llm;
pub mod supabase;

pub use ingredient_llm::OpenAiIngredientAdapter;
pub use routine_llm::OpenAiRoutineAdapter;
pub use supabase::SupabaseAuthAdapter;
